//! Stripe client wrapper.
//!
//! The client is an explicitly constructed handle carrying its own
//! configuration. It is cloned into every service rather than living in
//! process-wide state, so tests and multi-instance setups can hold
//! differently configured clients side by side.

use std::sync::Arc;

/// Stripe credentials and webhook settings, supplied by the process entry.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Signing secret for `/webhooks/stripe`. When absent, the webhook
    /// endpoint refuses everything unless unverified delivery was
    /// explicitly allowed (development only).
    pub webhook_secret: Option<String>,
}

/// Shared, thread-safe Stripe API handle.
#[derive(Clone)]
pub struct StripeClient {
    inner: stripe::Client,
    config: Arc<StripeConfig>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let inner = stripe::Client::new(config.secret_key.clone());
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    pub fn inner(&self) -> &stripe::Client {
        &self.inner
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
