//! Checkout session construction.
//!
//! Thin request-shaping over Stripe Checkout after customer resolution.
//! Input validation happens at the HTTP boundary; by the time a params
//! struct reaches this service its fields are known to be well-formed.

#![allow(clippy::field_reassign_with_default)] // Conditional struct field setting on Stripe params

use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::customers::CustomerService;
use crate::error::{BillingError, BillingResult};

/// Upper bound on cart line items, enforced at the HTTP boundary.
pub const MAX_CART_ITEMS: usize = 20;

#[derive(Debug, Clone)]
pub struct SubscriptionCheckoutParams {
    pub user_id: String,
    pub email: String,
    pub product_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct ItemCheckoutParams {
    pub user_id: String,
    pub email: String,
    pub product_id: String,
    pub price_id: String,
    pub quantity: u64,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct CartItem {
    pub price_id: String,
    pub quantity: u64,
}

#[derive(Debug, Clone)]
pub struct CartCheckoutParams {
    pub user_id: String,
    pub email: String,
    pub items: Vec<CartItem>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutResponse {
    pub checkout_session_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CartCheckoutResponse {
    pub checkout_session_id: String,
    pub checkout_url: String,
    pub item_count: usize,
}

#[derive(Clone)]
pub struct CheckoutService {
    stripe: StripeClient,
    pool: PgPool,
}

impl CheckoutService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Create a subscription-mode checkout session for one price.
    pub async fn subscription_checkout(
        &self,
        project_id: Uuid,
        params: &SubscriptionCheckoutParams,
    ) -> BillingResult<CheckoutResponse> {
        let customer = self
            .resolve_customer(project_id, &params.user_id, &params.email)
            .await?;

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), params.user_id.clone());
        metadata.insert("product_id".to_string(), params.product_id.clone());
        metadata.insert("payment_type".to_string(), "subscription".to_string());

        let line_items = vec![stripe::CreateCheckoutSessionLineItems {
            price: Some(params.price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }];

        let session = self
            .create_session(
                customer,
                stripe::CheckoutSessionMode::Subscription,
                line_items,
                metadata,
                &params.user_id,
                &params.success_url,
                &params.cancel_url,
            )
            .await?;

        tracing::info!(
            project_id = %project_id,
            user_id = %params.user_id,
            product_id = %params.product_id,
            session_id = %session.checkout_session_id,
            "Subscription checkout session created"
        );

        Ok(session)
    }

    /// Create a payment-mode checkout session for one price with quantity.
    pub async fn item_checkout(
        &self,
        project_id: Uuid,
        params: &ItemCheckoutParams,
    ) -> BillingResult<CheckoutResponse> {
        let customer = self
            .resolve_customer(project_id, &params.user_id, &params.email)
            .await?;

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), params.user_id.clone());
        metadata.insert("product_id".to_string(), params.product_id.clone());
        metadata.insert("payment_type".to_string(), "item".to_string());

        let line_items = vec![stripe::CreateCheckoutSessionLineItems {
            price: Some(params.price_id.clone()),
            quantity: Some(params.quantity),
            ..Default::default()
        }];

        let session = self
            .create_session(
                customer,
                stripe::CheckoutSessionMode::Payment,
                line_items,
                metadata,
                &params.user_id,
                &params.success_url,
                &params.cancel_url,
            )
            .await?;

        tracing::info!(
            project_id = %project_id,
            user_id = %params.user_id,
            product_id = %params.product_id,
            quantity = params.quantity,
            session_id = %session.checkout_session_id,
            "Item checkout session created"
        );

        Ok(session)
    }

    /// Create a payment-mode checkout session for a multi-item cart.
    pub async fn cart_checkout(
        &self,
        project_id: Uuid,
        params: &CartCheckoutParams,
    ) -> BillingResult<CartCheckoutResponse> {
        let customer = self
            .resolve_customer(project_id, &params.user_id, &params.email)
            .await?;

        let item_count = params.items.len();

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), params.user_id.clone());
        metadata.insert("payment_type".to_string(), "cart".to_string());
        metadata.insert("item_count".to_string(), item_count.to_string());

        let line_items = params
            .items
            .iter()
            .map(|item| stripe::CreateCheckoutSessionLineItems {
                price: Some(item.price_id.clone()),
                quantity: Some(item.quantity),
                ..Default::default()
            })
            .collect();

        let session = self
            .create_session(
                customer,
                stripe::CheckoutSessionMode::Payment,
                line_items,
                metadata,
                &params.user_id,
                &params.success_url,
                &params.cancel_url,
            )
            .await?;

        tracing::info!(
            project_id = %project_id,
            user_id = %params.user_id,
            item_count = item_count,
            session_id = %session.checkout_session_id,
            "Cart checkout session created"
        );

        Ok(CartCheckoutResponse {
            checkout_session_id: session.checkout_session_id,
            checkout_url: session.checkout_url,
            item_count,
        })
    }

    async fn resolve_customer(
        &self,
        project_id: Uuid,
        user_id: &str,
        email: &str,
    ) -> BillingResult<stripe::CustomerId> {
        let customers = CustomerService::new(self.stripe.clone(), self.pool.clone());
        let stripe_customer_id = customers.resolve(project_id, user_id, email).await?;

        stripe_customer_id.parse().map_err(|e| {
            BillingError::Internal(format!(
                "bound stripe customer id {} did not parse: {}",
                stripe_customer_id, e
            ))
        })
    }

    #[allow(clippy::too_many_arguments)] // Stripe checkout takes this many knobs
    async fn create_session(
        &self,
        customer: stripe::CustomerId,
        mode: stripe::CheckoutSessionMode,
        line_items: Vec<stripe::CreateCheckoutSessionLineItems>,
        metadata: HashMap<String, String>,
        user_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> BillingResult<CheckoutResponse> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(mode);
        params.customer = Some(customer);
        params.client_reference_id = Some(user_id);
        params.success_url = Some(success_url);
        params.cancel_url = Some(cancel_url);
        params.allow_promotion_codes = Some(true);
        params.billing_address_collection =
            Some(stripe::CheckoutSessionBillingAddressCollection::Required);
        params.line_items = Some(line_items);
        params.metadata = Some(metadata);

        let session = stripe::CheckoutSession::create(self.stripe.inner(), params).await?;

        let checkout_url = session
            .url
            .ok_or_else(|| BillingError::Internal("checkout session has no url".to_string()))?;

        Ok(CheckoutResponse {
            checkout_session_id: session.id.to_string(),
            checkout_url,
        })
    }
}
