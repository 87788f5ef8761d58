#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shared plumbing for the billing gateway workspace.
//!
//! Holds the pieces both the ledger crate and the API server need:
//! database pool construction, the subscription status enum, API key
//! generation, and the in-memory per-project rate limiter.

pub mod db;
pub mod keys;
pub mod rate_limit;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use keys::{generate_api_key, API_KEY_PREFIX};
pub use rate_limit::{RateLimitResult, RateLimiter};
pub use types::SubscriptionStatus;
