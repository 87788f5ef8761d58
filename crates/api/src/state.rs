//! Application state

use sqlx::PgPool;
use std::sync::Arc;

use billgate_ledger::{BillingService, StripeConfig};
use billgate_shared::RateLimiter;

use crate::auth::AuthState;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub billing: Arc<BillingService>,
    /// Per-project request throttling for authenticated routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let stripe_config = StripeConfig {
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
        };

        // Unverified webhooks are a development convenience only;
        // Config::from_env refuses a secretless production start.
        let allow_unverified = !config.environment.is_production();

        let billing = Arc::new(BillingService::new(
            stripe_config,
            pool.clone(),
            allow_unverified,
        ));
        tracing::info!("Billing service initialized");

        let rate_limiter = RateLimiter::new_in_memory();
        tracing::info!("Rate limiter initialized");

        Self {
            pool,
            config,
            billing,
            rate_limiter,
        }
    }

    /// Get auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            pool: self.pool.clone(),
            rate_limiter: self.rate_limiter.clone(),
            rate_limit_per_minute: self.config.rate_limit_per_minute,
        }
    }
}
