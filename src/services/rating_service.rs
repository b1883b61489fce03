use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{is_foreign_key_violation, DatabaseError};
use crate::database::models::{CaseRating, RatingSummary};

const RATING_CASE_FK: &str = "case_ratings_case_id_fkey";

pub const MIN_SCORE: i16 = 1;
pub const MAX_SCORE: i16 = 5;

pub struct RatingService {
    pool: PgPool,
}

impl RatingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn rate(
        &self,
        case_id: Uuid,
        user_id: Option<Uuid>,
        score: i16,
        comment: Option<String>,
    ) -> Result<CaseRating, DatabaseError> {
        validate_score(score)?;

        let rating = sqlx::query_as::<_, CaseRating>(
            r#"
            INSERT INTO case_ratings (case_id, user_id, score, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(case_id)
        .bind(user_id)
        .bind(score)
        .bind(comment.filter(|c| !c.trim().is_empty()))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err, RATING_CASE_FK) {
                DatabaseError::not_found("Case")
            } else {
                err.into()
            }
        })?;

        tracing::info!("Case {} rated {} by {:?}", case_id, score, user_id);
        Ok(rating)
    }

    /// Summary for a case that must exist
    pub async fn summary(&self, case_id: Uuid) -> Result<RatingSummary, DatabaseError> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM issue_cases WHERE id = $1")
            .bind(case_id)
            .fetch_optional(&self.pool)
            .await?;
        if found.is_none() {
            return Err(DatabaseError::not_found("Case"));
        }
        summarize(&self.pool, case_id).await
    }
}

pub fn validate_score(score: i16) -> Result<(), DatabaseError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(DatabaseError::validation(format!(
            "score must be between {} and {}",
            MIN_SCORE, MAX_SCORE
        )))
    }
}

/// Average (2 decimals), count and most recent score; zeroes when the case has no ratings
pub async fn summarize(pool: &PgPool, case_id: Uuid) -> Result<RatingSummary, DatabaseError> {
    let (average_score, total_ratings, latest_score): (Option<f64>, i64, Option<i16>) = sqlx::query_as(
        r#"
        SELECT ROUND(AVG(score)::numeric, 2)::float8,
               COUNT(*),
               (SELECT score FROM case_ratings
                WHERE case_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT 1)
        FROM case_ratings
        WHERE case_id = $1
        "#,
    )
    .bind(case_id)
    .fetch_one(pool)
    .await?;

    if total_ratings == 0 {
        return Ok(RatingSummary::empty());
    }

    Ok(RatingSummary {
        average_score: average_score.unwrap_or(0.0),
        total_ratings,
        latest_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_scores_in_range() {
        for score in 1..=5 {
            assert!(validate_score(score).is_ok());
        }
    }

    #[test]
    fn rejects_scores_out_of_range() {
        assert!(matches!(validate_score(0), Err(DatabaseError::Validation(_))));
        assert!(matches!(validate_score(6), Err(DatabaseError::Validation(_))));
    }

    #[test]
    fn empty_summary_serializes_with_zeroes() {
        let body = serde_json::to_value(RatingSummary::empty()).unwrap();
        assert_eq!(body, serde_json::json!({
            "average_score": 0.0,
            "total_ratings": 0,
            "latest_score": null
        }));
    }
}
