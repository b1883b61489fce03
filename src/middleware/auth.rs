use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// User resolved from the bearer token
#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub display_name: String,
}

/// Authenticated user when an `Authorization` header is present, anonymous otherwise.
///
/// A header carrying an unknown token is still rejected with 401.
#[derive(Clone, Debug)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = extract_bearer_token(&parts.headers).map_err(ApiError::unauthorized)?;
        let user = lookup_token(state.db.pool(), &token).await?;

        tracing::debug!("Authenticated user {} ({})", user.display_name, user.id);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeAuthUser(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|user| MaybeAuthUser(Some(user)))
    }
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        let token = token.trim();
        if token.is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// Match the token verbatim against stored user tokens
async fn lookup_token(pool: &PgPool, token: &str) -> Result<AuthUser, ApiError> {
    let row: Option<(Uuid, String)> = sqlx::query_as("SELECT id, display_name FROM users WHERE access_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiError::from(crate::database::DatabaseError::from(e)))?;

    match row {
        Some((id, display_name)) => Ok(AuthUser { id, display_name }),
        None => {
            tracing::warn!("Rejected unknown bearer token");
            Err(ApiError::unauthorized("Invalid access token"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc123")), Ok("abc123".to_string()));
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()),
            Err("Missing Authorization header".to_string())
        );
        assert!(extract_bearer_token(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert_eq!(
            extract_bearer_token(&headers("Bearer   ")),
            Err("Empty bearer token".to_string())
        );
    }
}
