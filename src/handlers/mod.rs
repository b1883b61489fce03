// handlers/mod.rs - HTTP handlers, one directory per resource
//
// Handlers stay thin: extract, validate the request shape, call a service,
// record the action and wrap the result. Auth is expressed per handler through
// the AuthUser / MaybeAuthUser extractors.

pub mod cases;
pub mod geocode;
pub mod issue_types;
pub mod organizations;
pub mod stats;
pub mod system;
pub mod users;
