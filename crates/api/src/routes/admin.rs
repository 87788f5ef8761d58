//! Admin endpoints: product catalog registration and project onboarding.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use billgate_ledger::RegisteredProduct;

use crate::auth::ProjectContext;
use crate::error::{ApiError, ApiResult, ErrorType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub plan_name: String,
    pub stripe_product_id: String,
    pub stripe_price_id: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterProductResponse {
    pub product: RegisteredProduct,
}

/// POST /admin/products/register
///
/// Registers a plan under the calling project's name. A duplicate
/// (project, plan) is a 409 carrying the existing registration's id.
pub async fn register_product(
    State(state): State<AppState>,
    Extension(project): Extension<ProjectContext>,
    body: Result<Json<RegisterProductRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterProductResponse>)> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return Err(ApiError::invalid_body(rejection.body_text())),
    };

    for (value, field) in [
        (&req.plan_name, "plan_name"),
        (&req.stripe_product_id, "stripe_product_id"),
        (&req.stripe_price_id, "stripe_price_id"),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::validation(
                format!("{} must not be empty", field),
                field,
            ));
        }
    }

    let outcome = state
        .billing
        .catalog
        .register(
            &project.project_name,
            &req.plan_name,
            &req.stripe_product_id,
            &req.stripe_price_id,
        )
        .await?;

    if !outcome.created {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            ErrorType::Api,
            "ALREADY_EXISTS",
            format!(
                "Plan '{}' is already registered for project '{}'",
                req.plan_name, project.project_name
            ),
        )
        .with_description(format!("existing product id: {}", outcome.product.id)));
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterProductResponse {
            product: outcome.product,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<RegisteredProduct>,
}

/// GET /admin/products
pub async fn list_products(
    State(state): State<AppState>,
    Extension(project): Extension<ProjectContext>,
) -> ApiResult<Json<ProductListResponse>> {
    let products = state
        .billing
        .catalog
        .list(&project.project_name)
        .await?;

    Ok(Json(ProductListResponse { products }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterProjectRequest {
    pub name: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterProjectResponse {
    pub project_id: uuid::Uuid,
    pub name: String,
    /// Shown exactly once, at creation. Not retrievable afterwards.
    pub api_key: String,
}

/// POST /admin/projects/register
///
/// Gated by `ADMIN_TOKEN` via the `X-Admin-Token` header. When no token
/// is configured, registration is open in development and refused in
/// production.
pub async fn register_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterProjectRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterProjectResponse>)> {
    check_admin_token(&state, &headers)?;

    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return Err(ApiError::invalid_body(rejection.body_text())),
    };

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty", "name"));
    }

    let project = state
        .billing
        .projects
        .create_project(req.name.trim(), req.webhook_url.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterProjectResponse {
            project_id: project.id,
            name: project.name.clone(),
            api_key: project.api_key,
        }),
    ))
}

fn check_admin_token(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    match &state.config.admin_token {
        Some(expected) => {
            let provided = headers
                .get("x-admin-token")
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();

            let matches: bool = provided
                .as_bytes()
                .ct_eq(expected.as_bytes())
                .into();
            if matches {
                Ok(())
            } else {
                Err(ApiError::unauthorized("Invalid admin token"))
            }
        }
        None if state.config.environment.is_production() => {
            Err(ApiError::unauthorized("Project registration is disabled"))
        }
        None => Ok(()),
    }
}
