use axum::extract::State;

use crate::database::models::IssueType;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/issue-types - Case categories, ordered by id
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<IssueType>> {
    let types = state.cases().issue_types().await?;
    Ok(ApiResponse::success(types))
}
