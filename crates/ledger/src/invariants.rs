//! Ledger Invariants Module
//!
//! Provides runnable consistency checks for the subscription ledger.
//! These invariants can be run after any mutation or webhook replay to
//! ensure the system is in a valid state.
//!
//! ## Design Principles
//!
//! 1. **Executable**: Each invariant is a real SQL query that can be run
//! 2. **Explanatory**: Violations include enough context to debug
//! 3. **Non-destructive**: Checks only read, never write
//! 4. **Complete**: Covers all critical ledger consistency requirements

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Project(s) affected
    pub project_ids: Vec<Uuid>,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    /// Severity level
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - tenant isolation or entitlement state may be wrong
    Critical,
    /// High - data inconsistency that needs attention
    High,
    /// Medium - potential issue, should investigate
    Medium,
    /// Low - minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    /// When the check was run
    pub checked_at: OffsetDateTime,
    /// Total number of checks run
    pub checks_run: usize,
    /// Number of checks that passed
    pub checks_passed: usize,
    /// Number of checks that failed
    pub checks_failed: usize,
    /// List of all violations found
    pub violations: Vec<InvariantViolation>,
    /// Overall health status
    pub healthy: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct DuplicateCustomerRow {
    project_id: Uuid,
    user_id: String,
    customer_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct DuplicateSubscriptionRow {
    project_id: Uuid,
    user_id: String,
    product_id: String,
    sub_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SharedStripeIdRow {
    stripe_id: String,
    row_count: i64,
    project_ids: Vec<Uuid>,
}

#[derive(Debug, sqlx::FromRow)]
struct CrossProjectSubRow {
    subscription_id: Uuid,
    subscription_project_id: Uuid,
    customer_project_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct UnboundSubscribedCustomerRow {
    customer_id: Uuid,
    project_id: Uuid,
    user_id: String,
}

/// Service for running ledger invariant checks
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all invariant checks and return summary
    pub async fn run_all_checks(&self) -> BillingResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_unique_customer_per_user().await?);
        violations.extend(self.check_unique_subscription_per_product().await?);
        violations.extend(self.check_stripe_subscription_id_unique().await?);
        violations.extend(self.check_stripe_customer_id_unique().await?);
        violations.extend(self.check_subscription_customer_same_project().await?);
        violations.extend(self.check_subscribed_customers_bound().await?);

        let checks_run = 6;
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: At most one customer row per (project, user)
    ///
    /// Duplicate rows would make the resolver nondeterministic and split a
    /// user's subscriptions across two Stripe customers.
    async fn check_unique_customer_per_user(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<DuplicateCustomerRow> = sqlx::query_as(
            r#"
            SELECT project_id, user_id, COUNT(*) as customer_count
            FROM customers
            GROUP BY project_id, user_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "unique_customer_per_user".to_string(),
                project_ids: vec![row.project_id],
                description: format!(
                    "User '{}' has {} customer rows (expected 1)",
                    row.user_id, row.customer_count
                ),
                context: serde_json::json!({
                    "user_id": row.user_id,
                    "customer_count": row.customer_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: At most one subscription per (project, user, product)
    ///
    /// The merged reader assumes this key is unique; duplicates would make
    /// status lookups ambiguous.
    async fn check_unique_subscription_per_product(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<DuplicateSubscriptionRow> = sqlx::query_as(
            r#"
            SELECT project_id, user_id, product_id, COUNT(*) as sub_count
            FROM subscriptions
            GROUP BY project_id, user_id, product_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "unique_subscription_per_product".to_string(),
                project_ids: vec![row.project_id],
                description: format!(
                    "User '{}' has {} subscription rows for product '{}' (expected 1)",
                    row.user_id, row.sub_count, row.product_id
                ),
                context: serde_json::json!({
                    "user_id": row.user_id,
                    "product_id": row.product_id,
                    "subscription_count": row.sub_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 3: A Stripe subscription id maps to one ledger row
    ///
    /// Webhook handlers address rows by stripe_subscription_id; a shared id
    /// would fan one Stripe subscription's events out to multiple users.
    async fn check_stripe_subscription_id_unique(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<SharedStripeIdRow> = sqlx::query_as(
            r#"
            SELECT
                stripe_subscription_id as stripe_id,
                COUNT(*) as row_count,
                ARRAY_AGG(DISTINCT project_id) as project_ids
            FROM subscriptions
            GROUP BY stripe_subscription_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "stripe_subscription_id_unique".to_string(),
                project_ids: row.project_ids,
                description: format!(
                    "Stripe subscription '{}' is claimed by {} ledger rows",
                    row.stripe_id, row.row_count
                ),
                context: serde_json::json!({
                    "stripe_subscription_id": row.stripe_id,
                    "row_count": row.row_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 4: A Stripe customer id is bound to one customer row
    ///
    /// The binding step enforces this at write time; a shared id would let
    /// one tenant's webhook traffic mutate another tenant's ledger.
    async fn check_stripe_customer_id_unique(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<SharedStripeIdRow> = sqlx::query_as(
            r#"
            SELECT
                stripe_customer_id as stripe_id,
                COUNT(*) as row_count,
                ARRAY_AGG(DISTINCT project_id) as project_ids
            FROM customers
            WHERE stripe_customer_id IS NOT NULL
            GROUP BY stripe_customer_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "stripe_customer_id_unique".to_string(),
                project_ids: row.project_ids,
                description: format!(
                    "Stripe customer '{}' is bound to {} customer rows",
                    row.stripe_id, row.row_count
                ),
                context: serde_json::json!({
                    "stripe_customer_id": row.stripe_id,
                    "row_count": row.row_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 5: Subscription and its customer share a project
    ///
    /// A subscription pointing at another project's customer is a tenant
    /// isolation breach.
    async fn check_subscription_customer_same_project(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<CrossProjectSubRow> = sqlx::query_as(
            r#"
            SELECT
                s.id as subscription_id,
                s.project_id as subscription_project_id,
                c.project_id as customer_project_id
            FROM subscriptions s
            JOIN customers c ON c.id = s.customer_id
            WHERE s.project_id != c.project_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "subscription_customer_same_project".to_string(),
                project_ids: vec![row.subscription_project_id, row.customer_project_id],
                description: "Subscription references a customer from another project"
                    .to_string(),
                context: serde_json::json!({
                    "subscription_id": row.subscription_id,
                    "subscription_project_id": row.subscription_project_id,
                    "customer_project_id": row.customer_project_id,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 6: Customers with subscriptions have a Stripe binding
    ///
    /// A subscription can only have been created through Stripe, so its
    /// customer must carry a stripe_customer_id.
    async fn check_subscribed_customers_bound(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<UnboundSubscribedCustomerRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT
                c.id as customer_id,
                c.project_id,
                c.user_id
            FROM customers c
            JOIN subscriptions s ON s.customer_id = c.id
            WHERE c.stripe_customer_id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "subscribed_customers_bound".to_string(),
                project_ids: vec![row.project_id],
                description: format!(
                    "User '{}' has subscriptions but no Stripe customer binding",
                    row.user_id
                ),
                context: serde_json::json!({
                    "customer_id": row.customer_id,
                    "user_id": row.user_id,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Run a single invariant check by name
    pub async fn run_check(&self, name: &str) -> BillingResult<Vec<InvariantViolation>> {
        match name {
            "unique_customer_per_user" => self.check_unique_customer_per_user().await,
            "unique_subscription_per_product" => {
                self.check_unique_subscription_per_product().await
            }
            "stripe_subscription_id_unique" => self.check_stripe_subscription_id_unique().await,
            "stripe_customer_id_unique" => self.check_stripe_customer_id_unique().await,
            "subscription_customer_same_project" => {
                self.check_subscription_customer_same_project().await
            }
            "subscribed_customers_bound" => self.check_subscribed_customers_bound().await,
            _ => Ok(vec![]),
        }
    }

    /// Get list of all available invariant checks
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "unique_customer_per_user",
            "unique_subscription_per_product",
            "stripe_subscription_id_unique",
            "stripe_customer_id_unique",
            "subscription_customer_same_project",
            "subscribed_customers_bound",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
        assert_eq!(ViolationSeverity::Low.to_string(), "LOW");
    }

    #[test]
    fn test_available_checks() {
        let checks = InvariantChecker::available_checks();
        assert_eq!(checks.len(), 6);
        assert!(checks.contains(&"unique_customer_per_user"));
        assert!(checks.contains(&"stripe_subscription_id_unique"));
    }
}
