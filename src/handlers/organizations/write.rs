// handlers/organizations/write.rs - POST /api/organizations and PUT /api/organizations/:id

use std::collections::HashMap;

use axum::extract::State;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::Organization;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppJson, AppPath, AuthUser};
use crate::services::organization_service::{NewOrganization, OrganizationUpdate};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub org_code: Option<String>,
    pub admin_code: Option<String>,
    pub name: Option<String>,
    pub org_type: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sub_district: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub org_type: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sub_district: Option<String>,
    /// Absent leaves the parent alone; `null` detaches to a root
    #[serde(default, deserialize_with = "present")]
    pub parent_id: Option<Option<Uuid>>,
}

/// Distinguish a field sent as `null` from a field left out
fn present<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CreateOrganizationRequest {
    pub fn validate(self) -> Result<NewOrganization, ApiError> {
        let org_code = non_blank(self.org_code);
        let name = non_blank(self.name);

        let mut errors = HashMap::new();
        if org_code.is_none() {
            errors.insert("org_code".to_string(), "is required".to_string());
        }
        if name.is_none() {
            errors.insert("name".to_string(), "is required".to_string());
        }
        let admin_code = non_blank(self.admin_code);
        if admin_code.is_some() && admin_code == org_code {
            errors.insert("admin_code".to_string(), "must differ from org_code".to_string());
        }
        if !errors.is_empty() {
            return Err(ApiError::validation_error("Invalid organization", Some(errors)));
        }

        Ok(NewOrganization {
            org_code: org_code.unwrap_or_default(),
            admin_code,
            name: name.unwrap_or_default(),
            org_type: non_blank(self.org_type),
            province: non_blank(self.province),
            district: non_blank(self.district),
            sub_district: non_blank(self.sub_district),
            parent_id: self.parent_id,
        })
    }
}

impl UpdateOrganizationRequest {
    pub fn into_update(self) -> Result<OrganizationUpdate, ApiError> {
        if matches!(self.name.as_deref().map(str::trim), Some("")) {
            return Err(ApiError::field_error("name", "must not be blank"));
        }
        Ok(OrganizationUpdate {
            name: non_blank(self.name),
            org_type: non_blank(self.org_type),
            province: non_blank(self.province),
            district: non_blank(self.district),
            sub_district: non_blank(self.sub_district),
            parent_id: self.parent_id,
        })
    }
}

/// POST /api/organizations - Create an organization, optionally under a parent
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateOrganizationRequest>,
) -> ApiResult<Organization> {
    let input = payload.validate()?;
    let org = state.organizations().create(input).await?;

    state.action_log.record(
        Some(user.id),
        "organization.create",
        json!({ "organization_id": org.id, "parent_id": org.parent_id }),
    );

    Ok(ApiResponse::created(org))
}

/// PUT /api/organizations/:id - Update fields and optionally re-parent the subtree
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateOrganizationRequest>,
) -> ApiResult<Organization> {
    let patch = payload.into_update()?;
    let moved = patch.parent_id.is_some();
    let org = state.organizations().update(id, patch).await?;

    state.action_log.record(
        Some(user.id),
        "organization.update",
        json!({ "organization_id": id, "reparented": moved, "parent_id": org.parent_id }),
    );

    Ok(ApiResponse::success(org))
}
