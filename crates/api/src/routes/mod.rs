//! HTTP route definitions.

pub mod admin;
pub mod checkout;
pub mod debug;
pub mod docs;
pub mod health;
pub mod portal;
pub mod subscriptions;
pub mod webhooks;

use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::auth::require_project;
use crate::state::AppState;

/// Read/write deadline for ordinary request handlers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Deadline for the webhook route. Sits above the per-event processing
/// budget inside the handler so the handler's own timeout is the one
/// that fires, and a slow event still gets acknowledged with 200
/// instead of a synthesized timeout response Stripe would retry.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(35);

/// Build the application router.
///
/// Three authentication zones: `/api/v1` requires a project API key,
/// `/webhooks/stripe` authenticates by signature, and everything else
/// (health, docs, admin registration) has its own gating. Timeouts are
/// applied per zone because the webhook route needs a longer budget
/// than the tenant routes.
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    let tenant_routes = Router::new()
        .route("/checkout/subscription", post(checkout::subscription_checkout))
        .route("/checkout/item", post(checkout::item_checkout))
        .route("/checkout/cart", post(checkout::cart_checkout))
        .route(
            "/subscriptions/{user_id}/{product_id}",
            get(subscriptions::get_subscription_status),
        )
        .route("/portal", post(portal::create_portal_session))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_project,
        ))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    // The auth layer call only wraps routes added before it; admin
    // registration is added after so it is gated by the admin token
    // inside its handler, not by a project key.
    let admin_routes = Router::new()
        .route("/products/register", post(admin::register_product))
        .route("/products", get(admin::list_products))
        .layer(middleware::from_fn_with_state(auth_state, require_project))
        .route("/projects/register", post(admin::register_project))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    let webhook_routes = Router::new()
        .route("/stripe", post(webhooks::stripe_webhook))
        .layer(TimeoutLayer::new(WEBHOOK_TIMEOUT));

    let mut service_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/docs", get(docs::docs_page))
        .route("/openapi.json", get(docs::openapi_spec));

    if !state.config.environment.is_production() {
        service_routes = service_routes.route("/debug", get(debug::debug_info));
    }

    Router::new()
        .merge(service_routes.layer(TimeoutLayer::new(REQUEST_TIMEOUT)))
        .nest("/webhooks", webhook_routes)
        .nest("/api/v1", tenant_routes)
        .nest("/admin", admin_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The route-level deadline must never preempt the per-event budget
    // inside the webhook handler, or a slow event gets a retryable
    // timeout response instead of an acknowledgement.
    #[test]
    fn webhook_route_budget_exceeds_handler_budget() {
        assert!(WEBHOOK_TIMEOUT > webhooks::HANDLER_TIMEOUT);
    }

    #[test]
    fn tenant_routes_use_the_short_deadline() {
        assert!(REQUEST_TIMEOUT < WEBHOOK_TIMEOUT);
        assert_eq!(REQUEST_TIMEOUT, Duration::from_secs(15));
    }
}
