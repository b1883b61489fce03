use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IssueType {
    pub id: i32,
    pub name: String,
    pub icon: Option<String>,
}
