pub mod activity;
pub mod case;
pub mod issue_type;
pub mod organization;
pub mod rating;
pub mod user;

pub use activity::{ActivityKind, ActivityLog, NewActivity};
pub use case::{CaseStatus, IssueCase};
pub use issue_type::IssueType;
pub use organization::{Membership, MembershipRole, Organization, OrganizationNode};
pub use rating::{CaseRating, RatingSummary};
pub use user::User;
