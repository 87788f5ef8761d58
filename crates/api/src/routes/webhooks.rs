//! Stripe webhook endpoint.
//!
//! Authentication is the delivery signature over the raw body, so the
//! body must be read as bytes before any JSON parsing. Verification and
//! parse failures are 400s (Stripe retries those); handler failures
//! after a verified parse are logged and acknowledged with 200, because
//! a redelivery of the same event would fail identically and the ledger
//! is repaired by later events or replay tooling instead.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use std::time::Duration;

use billgate_ledger::BillingEvent;

use crate::error::{ApiError, ApiResult, ErrorType};
use crate::state::AppState;

/// Bound on a single event's processing time, covering the Stripe and
/// database calls a handler makes. The route-level timeout in
/// `routes::create_router` is set above this so it cannot fire first.
pub(crate) const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// POST /webhooks/stripe
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let payload = std::str::from_utf8(&body).map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorType::Validation,
            "ENCODING_FAILED",
            "Webhook body is not valid UTF-8",
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    state.billing.webhooks.verify(payload, signature)?;

    let event = BillingEvent::parse(payload)?;
    let event_id = event.event_id().to_string();
    let event_kind = event.kind().to_string();

    match tokio::time::timeout(HANDLER_TIMEOUT, state.billing.webhooks.handle_event(event)).await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(
                event_id = %event_id,
                event_type = %event_kind,
                error = %e,
                "Webhook handler failed, acknowledging delivery"
            );
        }
        Err(_) => {
            tracing::error!(
                event_id = %event_id,
                event_type = %event_kind,
                timeout_secs = HANDLER_TIMEOUT.as_secs(),
                "Webhook handler timed out, acknowledging delivery"
            );
        }
    }

    Ok(StatusCode::OK)
}
