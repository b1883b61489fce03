// handlers/users/mod.rs - /api/users/me handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use crate::database::models::Membership;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppJson, AuthUser};
use crate::services::user_service::UserProfile;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub code: Option<String>,
}

/// GET /api/users/me - Caller's profile with organization memberships
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<UserProfile> {
    let profile = state.users().profile(user.id).await?;
    Ok(ApiResponse::success(profile))
}

/// POST /api/users/me/organizations - Join an organization by its member or admin code
pub async fn join(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<JoinRequest>,
) -> ApiResult<Membership> {
    let code = payload.code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return Err(ApiError::field_error("code", "is required"));
    }

    let membership = state.users().join_by_code(user.id, code).await?;

    state.action_log.record(
        Some(user.id),
        "user.join_organization",
        json!({ "organization_id": membership.organization_id, "role": membership.role }),
    );

    Ok(ApiResponse::created(membership))
}
