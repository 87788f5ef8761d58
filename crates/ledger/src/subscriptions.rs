//! Subscription ledger rows and the merged status reader.
//!
//! Rows are created and mutated only by webhook ingestion; the read path
//! never writes. At most one row exists per (project, user, product), and
//! `stripe_subscription_id` is globally unique across all projects.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use billgate_shared::SubscriptionStatus;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// One billing relationship as stored in the ledger.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub customer_id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub price_id: String,
    pub stripe_subscription_id: String,
    pub status: String,
    pub current_period_start: OffsetDateTime,
    pub current_period_end: OffsetDateTime,
}

impl SubscriptionRow {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from(self.status.as_str())
    }
}

/// Everything needed to insert-or-update one subscription row.
#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub project_id: Uuid,
    pub customer_id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub price_id: String,
    pub stripe_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: OffsetDateTime,
    pub current_period_end: OffsetDateTime,
}

/// What an upsert or status update actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Row inserted or overwritten.
    Applied,
    /// The stored row already reflects a later period; the write was a
    /// deliberate no-op so out-of-order deliveries cannot regress state.
    IgnoredStale,
    /// No row matched (status update targeting an unknown subscription).
    NoRow,
}

/// Answer returned by the merged status read.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubscriptionStatusView {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Unix seconds, UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<i64>,
}

impl SubscriptionStatusView {
    /// The normal answer for "no subscription": not an error.
    pub fn missing() -> Self {
        Self {
            exists: false,
            subscription_id: None,
            status: None,
            customer_id: None,
            current_period_end: None,
        }
    }
}

/// Map Stripe's live status onto the ledger enum, passing through anything
/// we do not model instead of coercing it.
pub(crate) fn from_stripe_status(status: stripe::SubscriptionStatus) -> SubscriptionStatus {
    use stripe::SubscriptionStatus as S;
    match status {
        S::Active => SubscriptionStatus::Active,
        S::Trialing => SubscriptionStatus::Trialing,
        S::PastDue => SubscriptionStatus::PastDue,
        S::Incomplete => SubscriptionStatus::Incomplete,
        S::IncompleteExpired => SubscriptionStatus::IncompleteExpired,
        S::Unpaid => SubscriptionStatus::Unpaid,
        S::Canceled => SubscriptionStatus::Canceled,
        other => SubscriptionStatus::Unknown(format!("{:?}", other).to_lowercase()),
    }
}

#[derive(Clone)]
pub struct SubscriptionService {
    stripe: StripeClient,
    pool: PgPool,
}

impl SubscriptionService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Insert-or-update keyed on (project_id, user_id, product_id).
    ///
    /// The stored `stripe_subscription_id` is an immutable match condition:
    /// a write carrying a different id for the same key signals a data bug
    /// and fails `Conflict`. A write whose `current_period_end` is strictly
    /// older than the stored one is ignored, so replayed or reordered
    /// webhook deliveries converge on the newest period's state.
    pub async fn upsert_subscription(
        &self,
        params: UpsertSubscription,
    ) -> BillingResult<WriteOutcome> {
        debug_assert!(params.status.is_storable());

        let result: Result<Option<(Uuid,)>, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (
                id, project_id, customer_id, user_id, product_id, price_id,
                stripe_subscription_id, status, current_period_start, current_period_end
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (project_id, user_id, product_id) DO UPDATE SET
                status = EXCLUDED.status,
                price_id = EXCLUDED.price_id,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = NOW()
            WHERE subscriptions.stripe_subscription_id = EXCLUDED.stripe_subscription_id
              AND subscriptions.current_period_end <= EXCLUDED.current_period_end
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.project_id)
        .bind(params.customer_id)
        .bind(&params.user_id)
        .bind(&params.product_id)
        .bind(&params.price_id)
        .bind(&params.stripe_subscription_id)
        .bind(params.status.as_str())
        .bind(params.current_period_start)
        .bind(params.current_period_end)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(_)) => Ok(WriteOutcome::Applied),
            Ok(None) => {
                // The conflict fired but the update WHERE refused the write.
                // Distinguish a stale replay from a diverging stripe id.
                let existing: Option<(String, OffsetDateTime)> = sqlx::query_as(
                    r#"
                    SELECT stripe_subscription_id, current_period_end
                    FROM subscriptions
                    WHERE project_id = $1 AND user_id = $2 AND product_id = $3
                    "#,
                )
                .bind(params.project_id)
                .bind(&params.user_id)
                .bind(&params.product_id)
                .fetch_optional(&self.pool)
                .await?;

                match existing {
                    Some((stored_id, _)) if stored_id != params.stripe_subscription_id => {
                        Err(BillingError::Conflict(format!(
                            "subscription ({}, {}, {}) already tracks {}, refused {}",
                            params.project_id,
                            params.user_id,
                            params.product_id,
                            stored_id,
                            params.stripe_subscription_id,
                        )))
                    }
                    Some((_, stored_end)) => {
                        tracing::debug!(
                            stripe_subscription_id = %params.stripe_subscription_id,
                            stored_period_end = %stored_end,
                            incoming_period_end = %params.current_period_end,
                            "Ignoring stale subscription upsert"
                        );
                        Ok(WriteOutcome::IgnoredStale)
                    }
                    None => Err(BillingError::Internal(format!(
                        "subscription upsert for {} matched a conflict but no row exists",
                        params.stripe_subscription_id
                    ))),
                }
            }
            // Insert path racing the global stripe_subscription_id index:
            // the same processor subscription already backs another key.
            Err(e) if BillingError::is_unique_violation(&e) => Err(BillingError::Conflict(
                format!(
                    "stripe subscription {} already recorded under another key",
                    params.stripe_subscription_id
                ),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Update status and period end by the globally unique Stripe id.
    ///
    /// No-op when the row is missing, when the incoming period end is
    /// strictly older than the stored one, or when the row is already
    /// canceled (cancellation is terminal for updates).
    pub async fn update_status(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
        period_end: OffsetDateTime,
    ) -> BillingResult<WriteOutcome> {
        debug_assert!(status.is_storable());

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2, current_period_end = $3, updated_at = NOW()
            WHERE stripe_subscription_id = $1
              AND current_period_end <= $3
              AND status <> 'canceled'
            "#,
        )
        .bind(stripe_subscription_id)
        .bind(status.as_str())
        .bind(period_end)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(WriteOutcome::Applied);
        }

        let exists: Option<(OffsetDateTime,)> = sqlx::query_as(
            "SELECT current_period_end FROM subscriptions WHERE stripe_subscription_id = $1",
        )
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        match exists {
            Some(_) => {
                tracing::debug!(
                    stripe_subscription_id = %stripe_subscription_id,
                    "Ignoring stale or post-cancellation status update"
                );
                Ok(WriteOutcome::IgnoredStale)
            }
            None => {
                tracing::debug!(
                    stripe_subscription_id = %stripe_subscription_id,
                    "Status update for unknown subscription, no-op"
                );
                Ok(WriteOutcome::NoRow)
            }
        }
    }

    /// Cancel by Stripe id. Cancellation applies from any state and the
    /// row is preserved; the period end only ever moves forward.
    pub async fn cancel(
        &self,
        stripe_subscription_id: &str,
        period_end: OffsetDateTime,
    ) -> BillingResult<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled',
                current_period_end = GREATEST(current_period_end, $2),
                updated_at = NOW()
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(stripe_subscription_id)
        .bind(period_end)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(WriteOutcome::Applied)
        } else {
            tracing::debug!(
                stripe_subscription_id = %stripe_subscription_id,
                "Cancellation for unknown subscription, no-op"
            );
            Ok(WriteOutcome::NoRow)
        }
    }

    /// Fetch the ledger row for a (project, user, product) key, if any.
    pub async fn get_row(
        &self,
        project_id: Uuid,
        user_id: &str,
        product_id: &str,
    ) -> BillingResult<Option<SubscriptionRow>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, customer_id, user_id, product_id, price_id,
                   stripe_subscription_id, status, current_period_start, current_period_end
            FROM subscriptions
            WHERE project_id = $1 AND user_id = $2 AND product_id = $3
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Merged status read: ledger row plus a live Stripe query.
    ///
    /// A missing row is a normal `exists=false` answer. When the row
    /// exists, Stripe is asked for the live state; if Stripe cannot
    /// answer, the ledger values are returned verbatim — the ledger is
    /// authoritative for last-known state and drift is repaired by
    /// webhooks, never by reads.
    pub async fn read_merged(
        &self,
        project_id: Uuid,
        user_id: &str,
        product_id: &str,
    ) -> BillingResult<SubscriptionStatusView> {
        let Some(row) = self.get_row(project_id, user_id, product_id).await? else {
            return Ok(SubscriptionStatusView::missing());
        };

        let parsed: Result<stripe::SubscriptionId, _> = row.stripe_subscription_id.parse();

        let live = match parsed {
            Ok(sub_id) => stripe::Subscription::retrieve(self.stripe.inner(), &sub_id, &[]).await,
            Err(e) => {
                tracing::warn!(
                    stripe_subscription_id = %row.stripe_subscription_id,
                    error = %e,
                    "Stored subscription id did not parse, serving ledger state"
                );
                return Ok(Self::view_from_row(&row));
            }
        };

        match live {
            Ok(subscription) => {
                let customer_id = match &subscription.customer {
                    stripe::Expandable::Id(id) => id.to_string(),
                    stripe::Expandable::Object(c) => c.id.to_string(),
                };

                Ok(SubscriptionStatusView {
                    exists: true,
                    subscription_id: Some(subscription.id.to_string()),
                    status: Some(from_stripe_status(subscription.status)),
                    customer_id: Some(customer_id),
                    current_period_end: Some(subscription.current_period_end),
                })
            }
            Err(e) => {
                tracing::warn!(
                    stripe_subscription_id = %row.stripe_subscription_id,
                    error = %e,
                    "Stripe query failed, serving ledger state"
                );
                Ok(Self::view_from_row(&row))
            }
        }
    }

    fn view_from_row(row: &SubscriptionRow) -> SubscriptionStatusView {
        SubscriptionStatusView {
            exists: true,
            subscription_id: Some(row.stripe_subscription_id.clone()),
            status: Some(row.status()),
            customer_id: Some(row.customer_id.to_string()),
            current_period_end: Some(row.current_period_end.unix_timestamp()),
        }
    }
}
