pub mod tree;
pub mod write;

pub use tree::ancestors as organization_ancestors;
pub use tree::descendants as organization_descendants;
pub use tree::get as organization_get;
pub use tree::members as organization_members;
pub use write::create as organization_create;
pub use write::update as organization_update;
