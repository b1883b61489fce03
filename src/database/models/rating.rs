use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CaseRating {
    pub id: Uuid,
    pub case_id: Uuid,
    pub user_id: Option<Uuid>,
    pub score: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate over a case's ratings; zeroes rather than nulls when there are none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average_score: f64,
    pub total_ratings: i64,
    pub latest_score: Option<i16>,
}

impl RatingSummary {
    pub fn empty() -> Self {
        Self {
            average_score: 0.0,
            total_ratings: 0,
            latest_score: None,
        }
    }
}
