pub mod assignment;
pub mod create;
pub mod mutate;
pub mod ratings;
pub mod read;

// Re-export handler functions for use in routing
pub use assignment::assign as case_assign;
pub use assignment::view as case_view;
pub use create::create as case_create;
pub use mutate::comment as case_comment;
pub use mutate::patch as case_patch;
pub use ratings::rate as case_rate;
pub use ratings::summary as case_rating_summary;
pub use read::activities as case_activities;
pub use read::get_by_code as case_get_by_code;
pub use read::get_by_id as case_get;
pub use read::list as case_list;
