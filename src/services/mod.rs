pub mod action_log;
pub mod activity;
pub mod case_code;
pub mod case_service;
pub mod geocoding;
pub mod organization_service;
pub mod rating_service;
pub mod stats_service;
pub mod user_service;

pub use action_log::ActionLog;
pub use case_service::CaseService;
pub use geocoding::{HttpGeocoder, ReverseGeocoder};
pub use organization_service::{OrgScope, OrganizationService};
pub use rating_service::RatingService;
pub use stats_service::StatsService;
pub use user_service::UserService;
