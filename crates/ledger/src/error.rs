//! Billing error taxonomy.
//!
//! Expected absence is never an error: reads that may legitimately miss
//! return `Option` / `exists=false`. `NotFound` is reserved for lookups
//! where the caller requires a row (e.g. webhook events referencing a
//! customer the resolver should have created).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    /// A write would violate a ledger invariant (unique key or an
    /// immutable column diverging). Carries enough context to debug.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A row the caller requires does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The customer row exists but was never bound to a Stripe customer,
    /// so portal/checkout operations that need one cannot proceed.
    #[error("no stripe customer bound for user {0}")]
    NoStripeCustomer(String),

    #[error("webhook signature invalid")]
    WebhookSignatureInvalid,

    #[error("webhook payload invalid: {0}")]
    WebhookPayloadInvalid(String),

    #[error("stripe error: {0}")]
    Stripe(#[from] stripe::StripeError),

    /// Storage unavailable or query failure. Always retryable by the caller.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Postgres unique_violation, surfaced when an insert races a unique
    /// index outside an ON CONFLICT target.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        )
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
