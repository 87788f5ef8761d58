//! Debug endpoint, mounted only outside production.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use billgate_ledger::InvariantCheckSummary;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub environment: &'static str,
    pub version: &'static str,
    pub webhook_verification: bool,
    pub invariants: InvariantCheckSummary,
}

/// GET /debug
///
/// Runs every ledger invariant check and reports the deployment shape.
/// Read-only; safe to hit repeatedly while reproducing an issue.
pub async fn debug_info(State(state): State<AppState>) -> ApiResult<Json<DebugResponse>> {
    let invariants = state.billing.invariants.run_all_checks().await?;

    Ok(Json(DebugResponse {
        environment: state.config.environment.as_str(),
        version: env!("CARGO_PKG_VERSION"),
        webhook_verification: state.config.stripe_webhook_secret.is_some(),
        invariants,
    }))
}
