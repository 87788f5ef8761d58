//! Customer rows and the Stripe-side customer resolver.
//!
//! A customer is a (project, end-user) pairing. `user_id` scoping is
//! strictly per-project: the same string in two projects names two rows.

use sqlx::PgPool;
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// One (project, end-user) pairing as stored in the ledger.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CustomerRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: String,
    pub email: String,
    pub stripe_customer_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Outcome of the find-or-create upsert: the row id plus whatever Stripe
/// binding it already carried.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerHandle {
    pub id: Uuid,
    pub stripe_customer_id: Option<String>,
}

#[derive(Clone)]
pub struct CustomerService {
    stripe: StripeClient,
    pool: PgPool,
}

impl CustomerService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Atomic upsert on (project_id, user_id). On insert the Stripe binding
    /// starts absent; on conflict the email is refreshed and the existing
    /// row returned. Concurrent first-touch calls converge to one row.
    pub async fn find_or_create(
        &self,
        project_id: Uuid,
        user_id: &str,
        email: &str,
    ) -> BillingResult<CustomerHandle> {
        let handle: CustomerHandle = sqlx::query_as(
            r#"
            INSERT INTO customers (id, project_id, user_id, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (project_id, user_id) DO UPDATE SET
                email = EXCLUDED.email,
                updated_at = NOW()
            RETURNING id, stripe_customer_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(user_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(handle)
    }

    /// Bind a Stripe customer id to the row, once. Rebinding to the same
    /// value is a no-op; a different value fails `Conflict` — the binding
    /// is immutable after the first write.
    pub async fn bind_stripe_customer(
        &self,
        project_id: Uuid,
        user_id: &str,
        stripe_customer_id: &str,
    ) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET stripe_customer_id = $3, updated_at = NOW()
            WHERE project_id = $1 AND user_id = $2
              AND (stripe_customer_id IS NULL OR stripe_customer_id = $3)
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(stripe_customer_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => Ok(()),
            Ok(_) => {
                // Either the row is missing or it is already bound elsewhere.
                match self.get_by_user(project_id, user_id).await? {
                    Some(row) => Err(BillingError::Conflict(format!(
                        "customer {} already bound to {}",
                        row.id,
                        row.stripe_customer_id.as_deref().unwrap_or("<none>"),
                    ))),
                    None => Err(BillingError::NotFound(format!(
                        "customer ({}, {})",
                        project_id, user_id
                    ))),
                }
            }
            Err(e) if BillingError::is_unique_violation(&e) => Err(BillingError::Conflict(
                format!("stripe customer {} already bound elsewhere", stripe_customer_id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_user(
        &self,
        project_id: Uuid,
        user_id: &str,
    ) -> BillingResult<Option<CustomerRecord>> {
        let row: Option<CustomerRecord> = sqlx::query_as(
            r#"
            SELECT id, project_id, user_id, email, stripe_customer_id, created_at, updated_at
            FROM customers
            WHERE project_id = $1 AND user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_by_stripe_id(
        &self,
        stripe_customer_id: &str,
    ) -> BillingResult<Option<CustomerRecord>> {
        let row: Option<CustomerRecord> = sqlx::query_as(
            r#"
            SELECT id, project_id, user_id, email, stripe_customer_id, created_at, updated_at
            FROM customers
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(stripe_customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Resolve the Stripe customer for a (project, user) pair, creating
    /// both the ledger row and the Stripe-side record on first touch.
    ///
    /// Two concurrent resolves can both reach the Stripe create; the bind
    /// serializes at the database and the loser re-reads the winner's id.
    /// The loser's Stripe customer is orphaned, which Stripe tolerates
    /// (both carry the user_id in metadata for out-of-band reconciliation).
    pub async fn resolve(
        &self,
        project_id: Uuid,
        user_id: &str,
        email: &str,
    ) -> BillingResult<String> {
        let handle = self.find_or_create(project_id, user_id, email).await?;

        if let Some(existing) = handle.stripe_customer_id {
            return Ok(existing);
        }

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        metadata.insert("project_id".to_string(), project_id.to_string());

        let mut params = stripe::CreateCustomer::new();
        params.email = Some(email);
        params.metadata = Some(metadata);

        let created = stripe::Customer::create(self.stripe.inner(), params).await?;
        let created_id = created.id.to_string();

        match self
            .bind_stripe_customer(project_id, user_id, &created_id)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    project_id = %project_id,
                    user_id = %user_id,
                    stripe_customer_id = %created_id,
                    "Stripe customer created and bound"
                );
                Ok(created_id)
            }
            Err(BillingError::Conflict(_)) => {
                // Lost the bind race. Return the winner's id and leave the
                // freshly created Stripe customer as a reconcilable orphan.
                let row = self
                    .get_by_user(project_id, user_id)
                    .await?
                    .ok_or_else(|| {
                        BillingError::Internal(format!(
                            "customer ({}, {}) vanished after bind conflict",
                            project_id, user_id
                        ))
                    })?;

                let winner = row.stripe_customer_id.ok_or_else(|| {
                    BillingError::Internal(format!(
                        "customer {} reported bound but has no stripe id",
                        row.id
                    ))
                })?;

                tracing::warn!(
                    project_id = %project_id,
                    user_id = %user_id,
                    orphan_stripe_customer_id = %created_id,
                    bound_stripe_customer_id = %winner,
                    "Lost customer bind race; orphan Stripe customer left for reconciliation"
                );

                Ok(winner)
            }
            Err(e) => Err(e),
        }
    }
}
