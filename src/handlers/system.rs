use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - Service information
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Civic Case API",
        "version": version,
        "environment": state.config.environment,
        "description": "Municipal issue tracking: cases, organizations, activity logs, ratings and statistics",
        "endpoints": {
            "health": "/health (public)",
            "cases": "/api/cases[/:id], /api/cases/code/:case_code",
            "case_actions": "/api/cases/:id/{activities,comments,organizations,view,ratings}",
            "organizations": "/api/organizations[/:id[/descendants|/ancestors|/members]]",
            "users": "/api/users/me[/organizations] (protected)",
            "issue_types": "/api/issue-types (public)",
            "stats": "/api/stats/{overview,timeseries,satisfaction} (protected)",
            "geocode": "/api/geocode/reverse (protected)",
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable",
                    "error": "SERVICE_UNAVAILABLE"
                })),
            )
        }
    }
}
