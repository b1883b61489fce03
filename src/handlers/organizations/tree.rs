use axum::extract::State;
use uuid::Uuid;

use crate::database::models::{Membership, Organization, OrganizationNode};
use crate::middleware::{ApiResponse, ApiResult, AppPath, AuthUser};
use crate::state::AppState;

/// GET /api/organizations/:id
pub async fn get(State(state): State<AppState>, AppPath(id): AppPath<Uuid>) -> ApiResult<Organization> {
    let org = state.organizations().get(id).await?;
    Ok(ApiResponse::success(org))
}

/// GET /api/organizations/:id/descendants - Subtree below the organization, with depth
pub async fn descendants(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Vec<OrganizationNode>> {
    let nodes = state.organizations().descendants(id).await?;
    Ok(ApiResponse::success(nodes))
}

/// GET /api/organizations/:id/ancestors - Path up to the root, with depth
pub async fn ancestors(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Vec<OrganizationNode>> {
    let nodes = state.organizations().ancestors(id).await?;
    Ok(ApiResponse::success(nodes))
}

/// GET /api/organizations/:id/members
pub async fn members(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Vec<Membership>> {
    let members = state.organizations().members(id).await?;
    Ok(ApiResponse::success(members))
}
