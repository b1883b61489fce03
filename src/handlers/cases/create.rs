// handlers/cases/create.rs - POST /api/cases handler

use std::collections::HashMap;

use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::models::IssueCase;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppJson, MaybeAuthUser};
use crate::services::case_service::NewCase;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_TAGS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    pub title: Option<String>,
    pub issue_type_id: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub organization_ids: Vec<Uuid>,
}

impl CreateCaseRequest {
    /// Check every field and report all problems at once
    pub fn validate(self) -> Result<NewCase, ApiError> {
        let mut errors = HashMap::new();

        let title = self.title.as_deref().map(str::trim).unwrap_or_default().to_string();
        if title.is_empty() {
            errors.insert("title".to_string(), "is required".to_string());
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.insert("title".to_string(), format!("must be at most {} characters", MAX_TITLE_LEN));
        }

        if self.issue_type_id.is_none() {
            errors.insert("issue_type_id".to_string(), "is required".to_string());
        }

        match self.latitude {
            None => {
                errors.insert("latitude".to_string(), "is required".to_string());
            }
            Some(lat) if !(-90.0..=90.0).contains(&lat) => {
                errors.insert("latitude".to_string(), "must be between -90 and 90".to_string());
            }
            _ => {}
        }

        match self.longitude {
            None => {
                errors.insert("longitude".to_string(), "is required".to_string());
            }
            Some(lon) if !(-180.0..=180.0).contains(&lon) => {
                errors.insert("longitude".to_string(), "must be between -180 and 180".to_string());
            }
            _ => {}
        }

        if self.tags.len() > MAX_TAGS {
            errors.insert("tags".to_string(), format!("at most {} tags", MAX_TAGS));
        }

        if !errors.is_empty() {
            return Err(ApiError::validation_error("Invalid case", Some(errors)));
        }

        let mut tags: Vec<String> = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.dedup();

        Ok(NewCase {
            title,
            description: self.description.filter(|d| !d.trim().is_empty()),
            issue_type_id: self.issue_type_id.unwrap_or_default(),
            latitude: self.latitude.unwrap_or_default(),
            longitude: self.longitude.unwrap_or_default(),
            cover_image_url: self.cover_image_url.filter(|u| !u.trim().is_empty()),
            tags,
            organization_ids: self.organization_ids,
        })
    }
}

/// POST /api/cases - Report a new case
///
/// Authentication is optional; an authenticated caller is recorded as the reporter.
/// Responds 201 with the stored case, including its generated `case_code`.
pub async fn create(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppJson(payload): AppJson<CreateCaseRequest>,
) -> ApiResult<IssueCase> {
    let input = payload.validate()?;
    let case = state.cases().create(input, user.as_ref()).await?;

    state.action_log.record(
        user.as_ref().map(|u| u.id),
        "case.create",
        json!({ "case_id": case.id, "case_code": case.case_code }),
    );

    Ok(ApiResponse::created(case))
}
