// handlers/cases/mutate.rs - PATCH /api/cases/:id and POST /api/cases/:id/comments

use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::CaseStatus;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppJson, AppPath, AuthUser};
use crate::services::case_service::CaseChange;
use crate::state::AppState;

/// PATCH body, discriminated by `action`
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CaseAction {
    UpdateStatus {
        new_status: String,
        comment: Option<String>,
        image_url: Option<String>,
    },
    UpdateCategory {
        new_type_id: i32,
        comment: Option<String>,
        image_url: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub comment: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub activity_id: Uuid,
    pub case_id: Uuid,
}

fn has_image(url: &Option<String>) -> bool {
    url.as_deref().is_some_and(|u| !u.trim().is_empty())
}

/// PATCH /api/cases/:id - Change status or category.
///
/// The previous value is always read server-side; the activity row and the update
/// commit together.
pub async fn patch(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(action): AppJson<CaseAction>,
) -> ApiResult<CaseChange> {
    let cases = state.cases();

    let (change, action_name) = match action {
        CaseAction::UpdateStatus {
            new_status,
            comment,
            image_url,
        } => {
            let status = new_status
                .parse::<CaseStatus>()
                .map_err(|e| ApiError::field_error("new_status", e.to_string()))?;
            let change = cases
                .update_status(id, status, &user, comment.as_deref(), has_image(&image_url))
                .await?;
            (change, "case.update_status")
        }
        CaseAction::UpdateCategory {
            new_type_id,
            comment,
            image_url,
        } => {
            let change = cases
                .update_category(id, new_type_id, &user, comment.as_deref(), has_image(&image_url))
                .await?;
            (change, "case.update_category")
        }
    };

    state.action_log.record(
        Some(user.id),
        action_name,
        json!({ "case_id": id, "old": change.old_value, "new": change.new_value }),
    );

    Ok(ApiResponse::success(change))
}

/// POST /api/cases/:id/comments - Append a comment without touching status
pub async fn comment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CommentRequest>,
) -> ApiResult<CommentCreated> {
    let note = payload.comment.as_deref().map(str::trim).unwrap_or_default();
    if note.is_empty() {
        return Err(ApiError::field_error("comment", "is required"));
    }

    let activity_id = state
        .cases()
        .add_comment(id, &user, note, has_image(&payload.image_url))
        .await?;

    state
        .action_log
        .record(Some(user.id), "case.comment", json!({ "case_id": id }));

    Ok(ApiResponse::created(CommentCreated { activity_id, case_id: id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tag_selects_variant() {
        let action: CaseAction = serde_json::from_value(json!({
            "action": "update_status",
            "new_status": "กำลังดำเนินการ",
            "comment": "crew sent"
        }))
        .unwrap();
        assert!(matches!(action, CaseAction::UpdateStatus { ref new_status, .. } if new_status == "กำลังดำเนินการ"));

        let action: CaseAction = serde_json::from_value(json!({
            "action": "update_category",
            "new_type_id": 4
        }))
        .unwrap();
        assert!(matches!(action, CaseAction::UpdateCategory { new_type_id: 4, .. }));
    }

    #[test]
    fn unknown_action_does_not_parse() {
        let parsed = serde_json::from_value::<CaseAction>(json!({ "action": "delete" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn blank_image_url_is_not_an_attachment() {
        assert!(has_image(&Some("https://img.example/a.jpg".to_string())));
        assert!(!has_image(&Some("  ".to_string())));
        assert!(!has_image(&None));
    }
}
