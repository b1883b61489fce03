use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AppJson, AppPath, AuthUser};
use crate::services::case_service::{CaseAssignment, ViewOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrganizationRef {
    pub organization_id: Uuid,
}

/// POST /api/cases/:id/organizations - Hand a case to an organization
pub async fn assign(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<OrganizationRef>,
) -> ApiResult<CaseAssignment> {
    let assignment = state
        .cases()
        .assign_organization(id, payload.organization_id, &user)
        .await?;

    state.action_log.record(
        Some(user.id),
        "case.assign",
        json!({ "case_id": id, "organization_id": payload.organization_id }),
    );

    Ok(ApiResponse::created(assignment))
}

/// POST /api/cases/:id/view - An organization opens its assignment
pub async fn view(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<OrganizationRef>,
) -> ApiResult<ViewOutcome> {
    let outcome = state
        .cases()
        .mark_viewed(id, payload.organization_id, user.id)
        .await?;

    state.action_log.record(
        Some(user.id),
        "case.view",
        json!({
            "case_id": id,
            "organization_id": payload.organization_id,
            "status_changed": outcome.status_changed,
        }),
    );

    Ok(ApiResponse::success(outcome))
}
