use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{CaseRating, RatingSummary};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppJson, AppPath, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub score: Option<i16>,
    pub comment: Option<String>,
}

/// POST /api/cases/:id/ratings - Record a satisfaction score (1-5)
pub async fn rate(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<RatingRequest>,
) -> ApiResult<CaseRating> {
    let score = payload
        .score
        .ok_or_else(|| ApiError::field_error("score", "is required"))?;

    let rating = state
        .ratings()
        .rate(id, Some(user.id), score, payload.comment)
        .await?;

    state
        .action_log
        .record(Some(user.id), "case.rate", json!({ "case_id": id, "score": score }));

    Ok(ApiResponse::created(rating))
}

/// GET /api/cases/:id/ratings - Average, count and latest score
pub async fn summary(State(state): State<AppState>, AppPath(id): AppPath<Uuid>) -> ApiResult<RatingSummary> {
    let summary = state.ratings().summary(id).await?;
    Ok(ApiResponse::success(summary))
}
