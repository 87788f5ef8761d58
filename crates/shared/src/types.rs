//! Subscription status as known to the ledger.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Subscription lifecycle status.
///
/// The stored set mirrors Stripe's subscription statuses. `None` is a
/// synthetic reader-side value for "no row exists" and is never written to
/// the database. `Unknown` carries a status string the upstream reported
/// that we do not model; it is passed through verbatim rather than coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Canceled,
    None,
    Unknown(String),
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Unknown(s) => s.as_str(),
        }
    }

    /// Whether this value may be written to the ledger. `None` is the
    /// reader's answer for a missing row, never a stored state.
    pub fn is_storable(&self) -> bool {
        !matches!(self, SubscriptionStatus::None)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, SubscriptionStatus::Canceled)
    }
}

impl From<&str> for SubscriptionStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "unpaid" => SubscriptionStatus::Unpaid,
            "canceled" => SubscriptionStatus::Canceled,
            "none" => SubscriptionStatus::None,
            other => SubscriptionStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for SubscriptionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubscriptionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = SubscriptionStatus;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a subscription status string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(SubscriptionStatus::from(v))
            }
        }

        deserializer.deserialize_str(StatusVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_round_trip() {
        for s in [
            "active",
            "trialing",
            "past_due",
            "incomplete",
            "incomplete_expired",
            "unpaid",
            "canceled",
            "none",
        ] {
            assert_eq!(SubscriptionStatus::from(s).as_str(), s);
        }
    }

    #[test]
    fn unknown_status_passes_through() {
        let status = SubscriptionStatus::from("paused");
        assert_eq!(status, SubscriptionStatus::Unknown("paused".to_string()));
        assert_eq!(status.as_str(), "paused");
    }

    #[test]
    fn none_is_not_storable() {
        assert!(!SubscriptionStatus::None.is_storable());
        assert!(SubscriptionStatus::Canceled.is_storable());
        assert!(SubscriptionStatus::Unknown("paused".into()).is_storable());
    }

    #[test]
    fn serde_uses_bare_strings() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");

        let parsed: SubscriptionStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(parsed, SubscriptionStatus::Canceled);
    }
}
