// Ledger crate clippy configuration
// These are intentional patterns in this crate:
#![allow(clippy::too_many_arguments)] // Some Stripe operations require many parameters
#![allow(clippy::field_reassign_with_default)] // Used for conditional struct field setting
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Billgate Ledger Module
//!
//! Handles Stripe integration for the multi-tenant billing gateway: the
//! project-scoped ledger, checkout orchestration, webhook ingestion, and
//! the merged subscription reader.
//!
//! ## Features
//!
//! - **Projects**: Tenant registration and API key lookup
//! - **Customers**: Lazy user-to-Stripe-customer resolution and binding
//! - **Checkout**: Subscription, single-item, and cart checkout sessions
//! - **Subscriptions**: Idempotent ledger writes with a monotone period guard
//! - **Merged Reads**: Live Stripe state with ledger fallback
//! - **Portal**: Stripe billing portal sessions
//! - **Catalog**: Registered product/price pairs per project
//! - **Webhooks**: Signature verification and event dispatch
//! - **Invariants**: Runnable consistency checks over the ledger

pub mod catalog;
pub mod checkout;
pub mod client;
pub mod customers;
pub mod error;
pub mod events;
pub mod invariants;
pub mod portal;
pub mod projects;
pub mod subscriptions;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Catalog
pub use catalog::{CatalogService, RegisterOutcome, RegisteredProduct};

// Checkout
pub use checkout::{
    CartCheckoutParams, CartCheckoutResponse, CartItem, CheckoutResponse, CheckoutService,
    ItemCheckoutParams, SubscriptionCheckoutParams, MAX_CART_ITEMS,
};

// Client
pub use client::{StripeClient, StripeConfig};

// Customers
pub use customers::{CustomerHandle, CustomerRecord, CustomerService};

// Error
pub use error::{BillingError, BillingResult};

// Events
pub use events::{
    BillingEvent, InvoicePayload, ItemPrice, PaymentMethodPayload, SubscriptionItem,
    SubscriptionPayload,
};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Portal
pub use portal::{PortalResponse, PortalService};

// Projects
pub use projects::{Project, ProjectService};

// Subscriptions
pub use subscriptions::{
    SubscriptionRow, SubscriptionService, SubscriptionStatusView, UpsertSubscription,
    WriteOutcome,
};

// Webhooks
pub use webhooks::{SignatureVerifier, WebhookHandler, SIGNATURE_TOLERANCE_SECS};

use sqlx::PgPool;

/// Main billing service that combines all ledger functionality
pub struct BillingService {
    pub projects: ProjectService,
    pub customers: CustomerService,
    pub checkout: CheckoutService,
    pub subscriptions: SubscriptionService,
    pub portal: PortalService,
    pub catalog: CatalogService,
    pub webhooks: WebhookHandler,
    pub invariants: InvariantChecker,
}

impl BillingService {
    /// Create a new billing service with explicit config.
    ///
    /// `allow_unverified_webhooks` must only be set in development; see
    /// [`WebhookHandler::new`].
    pub fn new(config: StripeConfig, pool: PgPool, allow_unverified_webhooks: bool) -> Self {
        let stripe = StripeClient::new(config);

        Self {
            projects: ProjectService::new(pool.clone()),
            customers: CustomerService::new(stripe.clone(), pool.clone()),
            checkout: CheckoutService::new(stripe.clone(), pool.clone()),
            subscriptions: SubscriptionService::new(stripe.clone(), pool.clone()),
            portal: PortalService::new(stripe.clone(), pool.clone()),
            catalog: CatalogService::new(pool.clone()),
            webhooks: WebhookHandler::new(stripe, pool.clone(), allow_unverified_webhooks),
            invariants: InvariantChecker::new(pool),
        }
    }
}
