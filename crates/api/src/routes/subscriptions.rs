//! Subscription status endpoint.

use axum::extract::{Extension, Path, State};
use axum::Json;

use billgate_ledger::SubscriptionStatusView;

use crate::auth::ProjectContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/subscriptions/{user_id}/{product_id}
///
/// Merged read: ledger row plus live processor state, falling back to
/// the ledger when the processor cannot answer. A user with no
/// subscription gets a 200 with `exists: false`.
pub async fn get_subscription_status(
    State(state): State<AppState>,
    Extension(project): Extension<ProjectContext>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> ApiResult<Json<SubscriptionStatusView>> {
    if user_id.trim().is_empty() {
        return Err(ApiError::validation("user_id must not be empty", "user_id"));
    }
    if product_id.trim().is_empty() {
        return Err(ApiError::validation(
            "product_id must not be empty",
            "product_id",
        ));
    }

    let view = state
        .billing
        .subscriptions
        .read_merged(project.project_id, &user_id, &product_id)
        .await?;

    Ok(Json(view))
}
