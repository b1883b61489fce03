use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of entry in a case's activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    StatusChange,
    TypeChange,
    Comment,
    Assignment,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Created => "created",
            ActivityKind::StatusChange => "status_change",
            ActivityKind::TypeChange => "type_change",
            ActivityKind::Comment => "comment",
            ActivityKind::Assignment => "assignment",
        }
    }
}

/// Timeline row as returned to clients, joined with the actor's display name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub case_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub changed_by_name: Option<String>,
    pub activity_type: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only insert payload
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub case_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub kind: ActivityKind,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
}
