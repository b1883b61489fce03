use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{ActivityLog, CaseStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppPath, AppQuery, AuthUser};
use crate::services::case_service::{CaseDetail, CaseFilter, CaseLookup, CasePage, DetailInclude};
use crate::services::OrgScope;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    /// Comma list of extra sections: timeline, organizations, rating, all
    pub include: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub organization_id: Option<Uuid>,
    pub include_children: Option<bool>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn into_filter(self) -> Result<CaseFilter, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<CaseStatus>()
                    .map_err(|e| ApiError::field_error("status", e.to_string()))?,
            ),
        };

        if self.include_children.is_some() && self.organization_id.is_none() {
            return Err(ApiError::field_error(
                "include_children",
                "requires organization_id",
            ));
        }

        let scope = self.organization_id.map(|organization_id| OrgScope {
            organization_id,
            include_children: self.include_children.unwrap_or(false),
        });

        Ok(CaseFilter {
            scope,
            status,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

/// GET /api/cases/:id - Case detail with optional sections
pub async fn get_by_id(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppQuery(query): AppQuery<DetailQuery>,
) -> ApiResult<CaseDetail> {
    let include = DetailInclude::parse(query.include.as_deref());
    let detail = state.cases().detail(CaseLookup::Id(id), include).await?;
    Ok(ApiResponse::success(detail))
}

/// GET /api/cases/code/:case_code - Same read path keyed by the public case code
pub async fn get_by_code(
    State(state): State<AppState>,
    AppPath(case_code): AppPath<String>,
    AppQuery(query): AppQuery<DetailQuery>,
) -> ApiResult<CaseDetail> {
    let include = DetailInclude::parse(query.include.as_deref());
    let detail = state.cases().detail(CaseLookup::Code(case_code), include).await?;
    Ok(ApiResponse::success(detail))
}

/// GET /api/cases - Newest cases first, optionally scoped to an organization subtree
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<CasePage> {
    let filter = query.into_filter()?;
    let page = state.cases().list(filter).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/cases/:id/activities - Timeline, newest first
pub async fn activities(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Vec<ActivityLog>> {
    let timeline = state.cases().activities(id).await?;
    Ok(ApiResponse::success(timeline))
}
