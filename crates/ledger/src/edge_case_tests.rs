// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Ledger
//!
//! Tests critical boundary conditions in:
//! - Webhook signature verification (timestamps, header parsing, key material)
//! - Webhook event parsing (known types, unknown types, malformed objects)
//! - Stripe status mapping

#[cfg(test)]
mod signature_tests {
    use crate::webhooks::{SignatureVerifier, SIGNATURE_TOLERANCE_SECS};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    const SECRET: &str = "whsec_test_secret_key";
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"invoice.payment_succeeded"}"#;

    /// Compute a valid v1 signature the way Stripe does.
    fn sign(secret: &str, payload: &str, timestamp: i64) -> String {
        let key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let header = format!("t={},v1={}", now, sign(SECRET, PAYLOAD, now));

        assert!(verifier.verify(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn test_timestamp_at_tolerance_boundary_accepted() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let ts = now - SIGNATURE_TOLERANCE_SECS;
        let header = format!("t={},v1={}", ts, sign(SECRET, PAYLOAD, ts));

        assert!(verifier.verify(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let ts = now - SIGNATURE_TOLERANCE_SECS - 1;
        let header = format!("t={},v1={}", ts, sign(SECRET, PAYLOAD, ts));

        assert!(verifier.verify(PAYLOAD, &header, now).is_err());
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let ts = now + SIGNATURE_TOLERANCE_SECS + 1;
        let header = format!("t={},v1={}", ts, sign(SECRET, PAYLOAD, ts));

        assert!(verifier.verify(PAYLOAD, &header, now).is_err());
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let header = format!("t={},v1={}", now, sign("whsec_other_key", PAYLOAD, now));

        assert!(verifier.verify(PAYLOAD, &header, now).is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let header = format!("t={},v1={}", now, sign(SECRET, PAYLOAD, now));

        let tampered = PAYLOAD.replace("evt_1", "evt_2");
        assert!(verifier.verify(&tampered, &header, now).is_err());
    }

    #[test]
    fn test_missing_timestamp_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let header = format!("v1={}", sign(SECRET, PAYLOAD, now));

        assert!(verifier.verify(PAYLOAD, &header, now).is_err());
    }

    #[test]
    fn test_missing_v1_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let header = format!("t={}", now);

        assert!(verifier.verify(PAYLOAD, &header, now).is_err());
    }

    #[test]
    fn test_garbage_header_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        assert!(verifier.verify(PAYLOAD, "not a signature", 1_700_000_000).is_err());
    }

    #[test]
    fn test_second_v1_entry_matches() {
        // Stripe sends multiple v1 entries during secret rotation; any
        // match passes.
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1_700_000_000;
        let stale = sign("whsec_rotated_away", PAYLOAD, now);
        let good = sign(SECRET, PAYLOAD, now);
        let header = format!("t={},v1={},v1={}", now, stale, good);

        assert!(verifier.verify(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn test_prefix_stripping_matches_bare_secret() {
        // The whsec_ prefix is presentation only; both spellings verify
        // the same signatures.
        let with_prefix = SignatureVerifier::new("whsec_abc123");
        let bare = SignatureVerifier::new("abc123");
        let now = 1_700_000_000;
        let header = format!("t={},v1={}", now, sign("whsec_abc123", PAYLOAD, now));

        assert!(with_prefix.verify(PAYLOAD, &header, now).is_ok());
        assert!(bare.verify(PAYLOAD, &header, now).is_ok());
    }
}

#[cfg(test)]
mod event_parse_tests {
    use crate::events::BillingEvent;
    use billgate_shared::SubscriptionStatus;

    fn subscription_event(kind: &str) -> String {
        format!(
            r#"{{
                "id": "evt_sub_1",
                "type": "{}",
                "data": {{
                    "object": {{
                        "id": "sub_1",
                        "customer": "cus_1",
                        "status": "active",
                        "items": {{
                            "data": [
                                {{"price": {{"id": "price_X", "product": "prod_X"}}}}
                            ]
                        }},
                        "current_period_start": 1700000000,
                        "current_period_end": 1702592000
                    }}
                }}
            }}"#,
            kind
        )
    }

    #[test]
    fn test_subscription_created_parses() {
        let event =
            BillingEvent::parse(&subscription_event("customer.subscription.created")).unwrap();

        match event {
            BillingEvent::SubscriptionCreated {
                event_id,
                subscription,
            } => {
                assert_eq!(event_id, "evt_sub_1");
                assert_eq!(subscription.id, "sub_1");
                assert_eq!(subscription.customer, "cus_1");
                assert_eq!(subscription.status, SubscriptionStatus::Active);
                assert_eq!(subscription.items.data.len(), 1);
                assert_eq!(subscription.items.data[0].price.id, "price_X");
                assert_eq!(subscription.items.data[0].price.product, "prod_X");
                assert_eq!(subscription.current_period_start, 1_700_000_000);
                assert_eq!(subscription.current_period_end, 1_702_592_000);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_subscription_deleted_parses() {
        let event =
            BillingEvent::parse(&subscription_event("customer.subscription.deleted")).unwrap();
        assert!(matches!(event, BillingEvent::SubscriptionDeleted { .. }));
    }

    #[test]
    fn test_unknown_event_type_is_total() {
        // An event type we have never seen must still parse, even when its
        // object shape is unfamiliar.
        let body = r#"{
            "id": "evt_42",
            "type": "entitlements.active_entitlement.created",
            "data": {"object": {"some": ["new", "shape"]}}
        }"#;

        let event = BillingEvent::parse(body).unwrap();
        match event {
            BillingEvent::Unknown { event_id, kind } => {
                assert_eq!(event_id, "evt_42");
                assert_eq!(kind, "entitlements.active_entitlement.created");
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_invoice_event_parses_with_nullable_customer() {
        let body = r#"{
            "id": "evt_inv_1",
            "type": "invoice.payment_failed",
            "data": {"object": {"id": "in_1", "customer": null}}
        }"#;

        let event = BillingEvent::parse(body).unwrap();
        match event {
            BillingEvent::InvoicePaymentFailed { invoice, .. } => {
                assert_eq!(invoice.id, "in_1");
                assert!(invoice.customer.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_payment_method_attached_parses() {
        let body = r#"{
            "id": "evt_pm_1",
            "type": "payment_method.attached",
            "data": {"object": {"id": "pm_1", "customer": "cus_1"}}
        }"#;

        let event = BillingEvent::parse(body).unwrap();
        assert!(matches!(
            event,
            BillingEvent::PaymentMethodAttached { .. }
        ));
    }

    #[test]
    fn test_malformed_envelope_rejected() {
        assert!(BillingEvent::parse("not json").is_err());
        assert!(BillingEvent::parse(r#"{"id": "evt_1"}"#).is_err());
    }

    #[test]
    fn test_known_type_with_unusable_object_rejected() {
        // The envelope is fine but the subscription object is missing
        // required fields; the delivery should be refused, not silently
        // half-applied.
        let body = r#"{
            "id": "evt_bad",
            "type": "customer.subscription.created",
            "data": {"object": {"id": "sub_1"}}
        }"#;

        assert!(BillingEvent::parse(body).is_err());
    }

    #[test]
    fn test_unrecognized_status_passes_through() {
        let body = subscription_event("customer.subscription.updated").replace(
            r#""status": "active""#,
            r#""status": "paused""#,
        );

        let event = BillingEvent::parse(&body).unwrap();
        match event {
            BillingEvent::SubscriptionUpdated { subscription, .. } => {
                assert_eq!(
                    subscription.status,
                    SubscriptionStatus::Unknown("paused".to_string())
                );
                assert_eq!(subscription.status.as_str(), "paused");
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_subscription_without_items_parses_but_has_no_line() {
        // items can be absent on some payload variants; creation handling
        // rejects it later, parsing does not.
        let body = r#"{
            "id": "evt_noitems",
            "type": "customer.subscription.updated",
            "data": {
                "object": {
                    "id": "sub_2",
                    "customer": "cus_2",
                    "status": "past_due",
                    "current_period_start": 1700000000,
                    "current_period_end": 1702592000
                }
            }
        }"#;

        let event = BillingEvent::parse(body).unwrap();
        match event {
            BillingEvent::SubscriptionUpdated { subscription, .. } => {
                assert!(subscription.items.data.is_empty());
                assert_eq!(subscription.status, SubscriptionStatus::PastDue);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }
}

#[cfg(test)]
mod status_mapping_tests {
    use crate::subscriptions::from_stripe_status;
    use billgate_shared::SubscriptionStatus;

    #[test]
    fn test_sdk_statuses_map_to_ledger_statuses() {
        assert_eq!(
            from_stripe_status(stripe::SubscriptionStatus::Active),
            SubscriptionStatus::Active
        );
        assert_eq!(
            from_stripe_status(stripe::SubscriptionStatus::Trialing),
            SubscriptionStatus::Trialing
        );
        assert_eq!(
            from_stripe_status(stripe::SubscriptionStatus::PastDue),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            from_stripe_status(stripe::SubscriptionStatus::Canceled),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            from_stripe_status(stripe::SubscriptionStatus::Incomplete),
            SubscriptionStatus::Incomplete
        );
        assert_eq!(
            from_stripe_status(stripe::SubscriptionStatus::IncompleteExpired),
            SubscriptionStatus::IncompleteExpired
        );
        assert_eq!(
            from_stripe_status(stripe::SubscriptionStatus::Unpaid),
            SubscriptionStatus::Unpaid
        );
    }

    #[test]
    fn test_sdk_statuses_outside_core_set_pass_through() {
        // Statuses the ledger has no dedicated variant for survive as
        // their wire string instead of being coerced.
        let mapped = from_stripe_status(stripe::SubscriptionStatus::Paused);
        assert_eq!(mapped, SubscriptionStatus::Unknown("paused".to_string()));
        assert_eq!(mapped.as_str(), "paused");
    }
}

#[cfg(test)]
mod status_view_tests {
    use crate::subscriptions::SubscriptionStatusView;

    #[test]
    fn test_missing_view_has_no_fields() {
        let view = SubscriptionStatusView::missing();
        assert!(!view.exists);
        assert!(view.subscription_id.is_none());
        assert!(view.status.is_none());
        assert!(view.customer_id.is_none());
        assert!(view.current_period_end.is_none());
    }
}
