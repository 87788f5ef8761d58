//! Stripe webhook event parsing.
//!
//! Events arrive as raw JSON and are parsed into a discriminated union
//! before any handler runs. The union is total over the event types the
//! ledger reacts to; everything else lands in `Unknown` and is
//! acknowledged without action. Parsing is independent of the Stripe SDK
//! so an SDK that trails Stripe's API never breaks ingestion.

use serde::Deserialize;

use billgate_shared::SubscriptionStatus;

use crate::error::{BillingError, BillingResult};

/// Subscription object as delivered inside webhook payloads. Referenced
/// objects (customer, product) arrive as bare id strings.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionPayload {
    pub id: String,
    pub customer: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub items: ItemList,
    pub current_period_start: i64,
    pub current_period_end: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: ItemPrice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemPrice {
    pub id: String,
    pub product: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePayload {
    #[serde(default)]
    pub id: String,
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethodPayload {
    pub id: String,
    pub customer: Option<String>,
}

/// Every webhook event the ingestor distinguishes.
#[derive(Debug, Clone)]
pub enum BillingEvent {
    SubscriptionCreated {
        event_id: String,
        subscription: SubscriptionPayload,
    },
    SubscriptionUpdated {
        event_id: String,
        subscription: SubscriptionPayload,
    },
    SubscriptionDeleted {
        event_id: String,
        subscription: SubscriptionPayload,
    },
    InvoicePaymentSucceeded {
        event_id: String,
        invoice: InvoicePayload,
    },
    InvoicePaymentFailed {
        event_id: String,
        invoice: InvoicePayload,
    },
    PaymentMethodAttached {
        event_id: String,
        payment_method: PaymentMethodPayload,
    },
    Unknown {
        event_id: String,
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

impl BillingEvent {
    /// Parse a raw webhook body. Fails only when the envelope itself is
    /// malformed or a known event type carries an unusable object; an
    /// unrecognized event type parses to `Unknown`.
    pub fn parse(body: &str) -> BillingResult<Self> {
        let envelope: EventEnvelope = serde_json::from_str(body)
            .map_err(|e| BillingError::WebhookPayloadInvalid(e.to_string()))?;

        let EventEnvelope { id, kind, data } = envelope;

        let event = match kind.as_str() {
            "customer.subscription.created" => BillingEvent::SubscriptionCreated {
                event_id: id,
                subscription: parse_object(data.object)?,
            },
            "customer.subscription.updated" => BillingEvent::SubscriptionUpdated {
                event_id: id,
                subscription: parse_object(data.object)?,
            },
            "customer.subscription.deleted" => BillingEvent::SubscriptionDeleted {
                event_id: id,
                subscription: parse_object(data.object)?,
            },
            "invoice.payment_succeeded" => BillingEvent::InvoicePaymentSucceeded {
                event_id: id,
                invoice: parse_object(data.object)?,
            },
            "invoice.payment_failed" => BillingEvent::InvoicePaymentFailed {
                event_id: id,
                invoice: parse_object(data.object)?,
            },
            "payment_method.attached" => BillingEvent::PaymentMethodAttached {
                event_id: id,
                payment_method: parse_object(data.object)?,
            },
            _ => BillingEvent::Unknown { event_id: id, kind },
        };

        Ok(event)
    }

    pub fn event_id(&self) -> &str {
        match self {
            BillingEvent::SubscriptionCreated { event_id, .. }
            | BillingEvent::SubscriptionUpdated { event_id, .. }
            | BillingEvent::SubscriptionDeleted { event_id, .. }
            | BillingEvent::InvoicePaymentSucceeded { event_id, .. }
            | BillingEvent::InvoicePaymentFailed { event_id, .. }
            | BillingEvent::PaymentMethodAttached { event_id, .. }
            | BillingEvent::Unknown { event_id, .. } => event_id,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            BillingEvent::SubscriptionCreated { .. } => "customer.subscription.created",
            BillingEvent::SubscriptionUpdated { .. } => "customer.subscription.updated",
            BillingEvent::SubscriptionDeleted { .. } => "customer.subscription.deleted",
            BillingEvent::InvoicePaymentSucceeded { .. } => "invoice.payment_succeeded",
            BillingEvent::InvoicePaymentFailed { .. } => "invoice.payment_failed",
            BillingEvent::PaymentMethodAttached { .. } => "payment_method.attached",
            BillingEvent::Unknown { kind, .. } => kind,
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> BillingResult<T> {
    serde_json::from_value(value).map_err(|e| BillingError::WebhookPayloadInvalid(e.to_string()))
}
