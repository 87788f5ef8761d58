//! Billing portal endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;

use billgate_ledger::PortalResponse;

use crate::auth::ProjectContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PortalRequest {
    pub user_id: String,
    pub return_url: String,
}

/// POST /api/v1/portal
pub async fn create_portal_session(
    State(state): State<AppState>,
    Extension(project): Extension<ProjectContext>,
    body: Result<Json<PortalRequest>, JsonRejection>,
) -> ApiResult<Json<PortalResponse>> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return Err(ApiError::invalid_body(rejection.body_text())),
    };

    if req.user_id.trim().is_empty() {
        return Err(ApiError::validation("user_id must not be empty", "user_id"));
    }
    if req.return_url.trim().is_empty() {
        return Err(ApiError::validation(
            "return_url must not be empty",
            "return_url",
        ));
    }

    let response = state
        .billing
        .portal
        .create_session(project.project_id, &req.user_id, &req.return_url)
        .await?;

    Ok(Json(response))
}
