pub mod auth;
pub mod extract;
pub mod response;

pub use auth::{AuthUser, MaybeAuthUser};
pub use extract::{AppJson, AppPath, AppQuery};
pub use response::{ApiResponse, ApiResult};
