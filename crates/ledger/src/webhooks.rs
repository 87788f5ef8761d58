//! Stripe webhook verification and dispatch.
//!
//! The webhook endpoint is authenticated by the processor signature, not
//! by an API key: the signed payload is `"<timestamp>.<raw_body>"`,
//! HMAC-SHA256 under the endpoint secret, compared in constant time
//! against every `v1` entry in the `Stripe-Signature` header. Stale
//! timestamps are rejected to bound replay.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use crate::client::StripeClient;
use crate::customers::CustomerService;
use crate::error::{BillingError, BillingResult};
use crate::events::{BillingEvent, SubscriptionPayload};
use crate::subscriptions::{SubscriptionService, UpsertSubscription, WriteOutcome};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook signature timestamp (seconds).
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Pure signature verifier, separable from I/O for testing.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    /// Build from the endpoint secret. The `whsec_` prefix Stripe shows
    /// in its dashboard is not part of the key material.
    pub fn new(webhook_secret: &str) -> Self {
        let secret = webhook_secret
            .strip_prefix("whsec_")
            .unwrap_or(webhook_secret);
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Verify `signature_header` over `payload` at `now_unix`.
    ///
    /// The header format is `t=<ts>,v1=<hex>[,v1=<hex>...]`; any matching
    /// `v1` entry passes. Comparison is constant-time.
    pub fn verify(
        &self,
        payload: &str,
        signature_header: &str,
        now_unix: i64,
    ) -> BillingResult<()> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => v1_signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(BillingError::WebhookSignatureInvalid)?;

        if v1_signatures.is_empty() {
            return Err(BillingError::WebhookSignatureInvalid);
        }

        if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            tracing::warn!(
                timestamp = timestamp,
                now = now_unix,
                "Webhook signature timestamp outside tolerance"
            );
            return Err(BillingError::WebhookSignatureInvalid);
        }

        let signed_payload = format!("{}.{}", timestamp, payload);

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| BillingError::WebhookSignatureInvalid)?;
        mac.update(signed_payload.as_bytes());
        let computed = hex::encode(mac.finalize().into_bytes());

        let matched = v1_signatures
            .iter()
            .any(|sig| computed.as_bytes().ct_eq(sig.as_bytes()).into());

        if matched {
            Ok(())
        } else {
            tracing::warn!("Webhook signature mismatch");
            Err(BillingError::WebhookSignatureInvalid)
        }
    }
}

/// Webhook ingestor: verifies, then dispatches one handler per event
/// variant. Handlers are idempotent; replays and reordered deliveries
/// converge via the ledger's keyed upserts and monotone period guard.
#[derive(Clone)]
pub struct WebhookHandler {
    stripe: StripeClient,
    pool: PgPool,
    verifier: Option<SignatureVerifier>,
    allow_unverified: bool,
}

impl WebhookHandler {
    /// `allow_unverified` bypasses verification when no secret is
    /// configured. It must only be set in development; production without
    /// a secret refuses every delivery.
    pub fn new(stripe: StripeClient, pool: PgPool, allow_unverified: bool) -> Self {
        let verifier = stripe
            .config()
            .webhook_secret
            .as_deref()
            .map(SignatureVerifier::new);

        if verifier.is_none() {
            if allow_unverified {
                tracing::warn!(
                    "No webhook secret configured; accepting unverified deliveries (development)"
                );
            } else {
                tracing::error!(
                    "No webhook secret configured; all webhook deliveries will be refused"
                );
            }
        }

        Self {
            stripe,
            pool,
            verifier,
            allow_unverified,
        }
    }

    /// Check the `Stripe-Signature` header against the raw body.
    pub fn verify(&self, payload: &str, signature_header: &str) -> BillingResult<()> {
        match &self.verifier {
            Some(verifier) => verifier.verify(
                payload,
                signature_header,
                OffsetDateTime::now_utc().unix_timestamp(),
            ),
            None if self.allow_unverified => Ok(()),
            None => Err(BillingError::WebhookSignatureInvalid),
        }
    }

    /// Dispatch a parsed event to its handler.
    pub async fn handle_event(&self, event: BillingEvent) -> BillingResult<()> {
        tracing::info!(
            event_id = %event.event_id(),
            event_type = %event.kind(),
            "Processing webhook event"
        );

        match event {
            BillingEvent::SubscriptionCreated {
                event_id,
                subscription,
            } => self.handle_subscription_created(&event_id, subscription).await,
            BillingEvent::SubscriptionUpdated {
                event_id,
                subscription,
            } => self.handle_subscription_updated(&event_id, subscription).await,
            BillingEvent::SubscriptionDeleted {
                event_id,
                subscription,
            } => self.handle_subscription_deleted(&event_id, subscription).await,
            BillingEvent::InvoicePaymentSucceeded { event_id, invoice } => {
                tracing::info!(
                    event_id = %event_id,
                    invoice_id = %invoice.id,
                    customer = ?invoice.customer,
                    "Invoice payment succeeded"
                );
                Ok(())
            }
            BillingEvent::InvoicePaymentFailed { event_id, invoice } => {
                tracing::warn!(
                    event_id = %event_id,
                    invoice_id = %invoice.id,
                    customer = ?invoice.customer,
                    "Invoice payment failed"
                );
                Ok(())
            }
            BillingEvent::PaymentMethodAttached {
                event_id,
                payment_method,
            } => {
                tracing::info!(
                    event_id = %event_id,
                    payment_method_id = %payment_method.id,
                    customer = ?payment_method.customer,
                    "Payment method attached"
                );
                Ok(())
            }
            BillingEvent::Unknown { event_id, kind } => {
                // Acknowledged without action; logged so new event types
                // that may need handlers show up in traffic.
                tracing::info!(
                    event_id = %event_id,
                    event_type = %kind,
                    "Unhandled webhook event type"
                );
                Ok(())
            }
        }
    }

    async fn handle_subscription_created(
        &self,
        event_id: &str,
        subscription: SubscriptionPayload,
    ) -> BillingResult<()> {
        let customers = CustomerService::new(self.stripe.clone(), self.pool.clone());

        // The customer must already exist: the resolver created it before
        // checkout, or an earlier event bound it.
        let customer = customers
            .get_by_stripe_id(&subscription.customer)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!("customer {}", subscription.customer))
            })?;

        let item = subscription.items.data.first().ok_or_else(|| {
            BillingError::WebhookPayloadInvalid(format!(
                "subscription {} has no line items",
                subscription.id
            ))
        })?;

        let subs = SubscriptionService::new(self.stripe.clone(), self.pool.clone());
        let outcome = subs
            .upsert_subscription(UpsertSubscription {
                project_id: customer.project_id,
                customer_id: customer.id,
                user_id: customer.user_id.clone(),
                product_id: item.price.product.clone(),
                price_id: item.price.id.clone(),
                stripe_subscription_id: subscription.id.clone(),
                status: subscription.status.clone(),
                current_period_start: unix_ts(subscription.current_period_start)?,
                current_period_end: unix_ts(subscription.current_period_end)?,
            })
            .await?;

        tracing::info!(
            event_id = %event_id,
            project_id = %customer.project_id,
            user_id = %customer.user_id,
            stripe_subscription_id = %subscription.id,
            outcome = ?outcome,
            "Subscription created"
        );

        Ok(())
    }

    async fn handle_subscription_updated(
        &self,
        event_id: &str,
        subscription: SubscriptionPayload,
    ) -> BillingResult<()> {
        let subs = SubscriptionService::new(self.stripe.clone(), self.pool.clone());
        let outcome = subs
            .update_status(
                &subscription.id,
                subscription.status.clone(),
                unix_ts(subscription.current_period_end)?,
            )
            .await?;

        if outcome == WriteOutcome::NoRow {
            // Updates can outrun creation; the next created replay or
            // reconciliation pass fills the row.
            tracing::warn!(
                event_id = %event_id,
                stripe_subscription_id = %subscription.id,
                "Update for subscription not in ledger"
            );
        } else {
            tracing::info!(
                event_id = %event_id,
                stripe_subscription_id = %subscription.id,
                status = %subscription.status,
                outcome = ?outcome,
                "Subscription updated"
            );
        }

        Ok(())
    }

    async fn handle_subscription_deleted(
        &self,
        event_id: &str,
        subscription: SubscriptionPayload,
    ) -> BillingResult<()> {
        let subs = SubscriptionService::new(self.stripe.clone(), self.pool.clone());
        let outcome = subs
            .cancel(
                &subscription.id,
                unix_ts(subscription.current_period_end)?,
            )
            .await?;

        tracing::info!(
            event_id = %event_id,
            stripe_subscription_id = %subscription.id,
            outcome = ?outcome,
            "Subscription canceled"
        );

        Ok(())
    }
}

fn unix_ts(seconds: i64) -> BillingResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds).map_err(|_| {
        BillingError::WebhookPayloadInvalid(format!("timestamp {} out of range", seconds))
    })
}
