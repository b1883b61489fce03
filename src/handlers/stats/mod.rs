// handlers/stats/mod.rs - GET /api/stats/* handlers

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppQuery, AuthUser};
use crate::services::stats_service::{DailyBucket, Overview, Satisfaction, StatsInterval};
use crate::services::OrgScope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub organization_id: Option<Uuid>,
    pub include_children: Option<bool>,
    pub interval: Option<String>,
}

impl StatsQuery {
    pub fn scope(&self) -> Result<OrgScope, ApiError> {
        let organization_id = self
            .organization_id
            .ok_or_else(|| ApiError::field_error("organization_id", "is required"))?;
        Ok(OrgScope {
            organization_id,
            include_children: self.include_children.unwrap_or(false),
        })
    }

    pub fn interval(&self) -> Result<StatsInterval, ApiError> {
        match self.interval.as_deref() {
            None | Some("") => Ok(StatsInterval::default()),
            Some(raw) => raw
                .parse::<StatsInterval>()
                .map_err(|e| ApiError::field_error("interval", e)),
        }
    }
}

/// GET /api/stats/overview
pub async fn overview(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<StatsQuery>,
) -> ApiResult<Overview> {
    let overview = state.stats().overview(query.scope()?).await?;
    Ok(ApiResponse::success(overview))
}

/// GET /api/stats/timeseries?interval=7d|30d|90d|365d
pub async fn timeseries(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<StatsQuery>,
) -> ApiResult<Vec<DailyBucket>> {
    let scope = query.scope()?;
    let interval = query.interval()?;
    let buckets = state.stats().timeseries(scope, interval).await?;
    Ok(ApiResponse::success(buckets))
}

/// GET /api/stats/satisfaction
pub async fn satisfaction(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<StatsQuery>,
) -> ApiResult<Satisfaction> {
    let satisfaction = state.stats().satisfaction(query.scope()?).await?;
    Ok(ApiResponse::success(satisfaction))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(organization_id: Option<Uuid>, interval: Option<&str>) -> StatsQuery {
        StatsQuery {
            organization_id,
            include_children: None,
            interval: interval.map(str::to_string),
        }
    }

    #[test]
    fn organization_is_required() {
        let err = query(None, None).scope().unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["organization_id"], "is required");
    }

    #[test]
    fn interval_defaults_to_thirty_days() {
        let q = query(Some(Uuid::nil()), None);
        assert_eq!(q.interval().unwrap(), StatsInterval::Month);
        assert!(!q.scope().unwrap().include_children);
    }

    #[test]
    fn unsupported_interval_is_bad_request() {
        let err = query(Some(Uuid::nil()), Some("2w")).interval().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
