use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row in `organizations`. The admin code is a join secret and is not serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub org_code: String,
    #[serde(skip_serializing)]
    pub admin_code: Option<String>,
    pub name: String,
    pub org_type: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sub_district: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organization reached through the closure table, with its distance from the anchor
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationNode {
    pub id: Uuid,
    pub org_code: String,
    pub name: String,
    pub org_type: Option<String>,
    pub parent_id: Option<Uuid>,
    pub depth: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Member,
    Admin,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Member => "member",
            MembershipRole::Admin => "admin",
        }
    }
}

/// A user's membership in an organization
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub user_id: Uuid,
    pub display_name: String,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}
