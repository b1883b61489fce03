pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::middleware::response::{json_method_not_allowed, route_not_found};
use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);
    let body_limit = state.config.api.max_request_size_bytes;

    Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .route("/api/issue-types", get(handlers::issue_types::list))
        // Resources; auth is enforced per handler by the AuthUser extractor
        .merge(case_routes())
        .merge(organization_routes())
        .merge(user_routes())
        .merge(stats_routes())
        .route("/api/geocode/reverse", get(handlers::geocode::reverse))
        .fallback(route_not_found)
        // Global middleware
        .layer(axum::middleware::map_response(json_method_not_allowed))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn case_routes() -> Router<AppState> {
    use handlers::cases;

    Router::new()
        .route("/api/cases", get(cases::case_list).post(cases::case_create))
        .route("/api/cases/code/:case_code", get(cases::case_get_by_code))
        .route("/api/cases/:id", get(cases::case_get).patch(cases::case_patch))
        .route("/api/cases/:id/activities", get(cases::case_activities))
        .route("/api/cases/:id/comments", post(cases::case_comment))
        .route("/api/cases/:id/organizations", post(cases::case_assign))
        .route("/api/cases/:id/view", post(cases::case_view))
        .route(
            "/api/cases/:id/ratings",
            get(cases::case_rating_summary).post(cases::case_rate),
        )
}

fn organization_routes() -> Router<AppState> {
    use handlers::organizations as orgs;

    Router::new()
        .route("/api/organizations", post(orgs::organization_create))
        .route(
            "/api/organizations/:id",
            get(orgs::organization_get).put(orgs::organization_update),
        )
        .route("/api/organizations/:id/descendants", get(orgs::organization_descendants))
        .route("/api/organizations/:id/ancestors", get(orgs::organization_ancestors))
        .route("/api/organizations/:id/members", get(orgs::organization_members))
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/api/users/me", get(users::me))
        .route("/api/users/me/organizations", post(users::join))
}

fn stats_routes() -> Router<AppState> {
    use handlers::stats;

    Router::new()
        .route("/api/stats/overview", get(stats::overview))
        .route("/api/stats/timeseries", get(stats::timeseries))
        .route("/api/stats/satisfaction", get(stats::satisfaction))
}

/// CORS from configured origins; `*` allows any origin
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if security.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
