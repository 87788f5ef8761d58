//! Project authentication middleware for Axum
//!
//! Tenant routes authenticate with an `X-API-Key` header carrying a
//! project key. A valid key resolves to a [`ProjectContext`] inserted
//! into request extensions; every downstream handler scopes its queries
//! by that project id and never trusts ids from the request body.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sqlx::PgPool;
use uuid::Uuid;

use billgate_shared::{RateLimiter, API_KEY_PREFIX};

use crate::error::ApiError;

/// Authenticated project, available to handlers via `Extension`.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project_id: Uuid,
    pub project_name: String,
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    pub pool: PgPool,
    pub rate_limiter: RateLimiter,
    pub rate_limit_per_minute: u32,
}

pub(super) fn extract_api_key(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// Safe prefix of a key for logging. Never log a full key.
pub(super) fn key_prefix(key: &str) -> &str {
    let end = key.len().min(12);
    &key[..end]
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
}

/// Middleware that requires a valid project API key.
///
/// Failures are uniform 401s: a missing header, a malformed key, and a
/// key that matches no active project are indistinguishable to the
/// caller.
pub async fn require_project(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(key) = extract_api_key(&request) else {
        tracing::warn!(path = %path, "Missing X-API-Key header");
        return ApiError::unauthorized("Missing API key").into_response();
    };

    if !key.starts_with(API_KEY_PREFIX) {
        tracing::warn!(path = %path, key_prefix = key_prefix(key), "Malformed API key");
        return ApiError::unauthorized("Invalid API key").into_response();
    }

    let project: Option<ProjectRow> = match sqlx::query_as(
        "SELECT id, name FROM projects WHERE api_key = $1 AND is_active = TRUE",
    )
    .bind(key)
    .fetch_optional(&auth_state.pool)
    .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Project lookup failed");
            return ApiError::internal("Authentication unavailable").into_response();
        }
    };

    let Some(project) = project else {
        tracing::warn!(
            path = %path,
            key_prefix = key_prefix(key),
            "API key matched no active project"
        );
        return ApiError::unauthorized("Invalid API key").into_response();
    };

    let limit = auth_state.rate_limit_per_minute;
    let rate = auth_state.rate_limiter.check_project(project.id, limit).await;
    if !rate.allowed {
        tracing::warn!(
            path = %path,
            project_id = %project.id,
            "Project rate limit exceeded"
        );
        return ApiError::rate_limited(rate.retry_after_seconds.unwrap_or(60)).into_response();
    }

    tracing::debug!(
        path = %path,
        project_id = %project.id,
        project_name = %project.name,
        remaining = rate.remaining_minute,
        "Project authenticated"
    );

    request.extensions_mut().insert(ProjectContext {
        project_id: project.id,
        project_name: project.name,
    });
    next.run(request).await
}
