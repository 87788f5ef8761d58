//! Registered product catalog.
//!
//! Lets a tenant record which Stripe product/price pairs it has set up so
//! it can enumerate them later. (project_name, plan_name) is unique.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RegisteredProduct {
    pub id: Uuid,
    pub project_name: String,
    pub plan_name: String,
    pub stripe_product_id: String,
    pub stripe_price_id: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Result of a registration attempt. A duplicate is reported with the
/// existing row so the caller can surface its id.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub created: bool,
    pub product: RegisteredProduct,
}

#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a plan. Racing registrations converge on one row; the
    /// loser gets the winner's row back with `created = false`.
    pub async fn register(
        &self,
        project_name: &str,
        plan_name: &str,
        stripe_product_id: &str,
        stripe_price_id: &str,
    ) -> BillingResult<RegisterOutcome> {
        let inserted: Option<RegisteredProduct> = sqlx::query_as(
            r#"
            INSERT INTO registered_products
                (id, project_name, plan_name, stripe_product_id, stripe_price_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (project_name, plan_name) DO NOTHING
            RETURNING id, project_name, plan_name, stripe_product_id, stripe_price_id,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(project_name)
        .bind(plan_name)
        .bind(stripe_product_id)
        .bind(stripe_price_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(product) = inserted {
            tracing::info!(
                project_name = %project_name,
                plan_name = %plan_name,
                product_id = %product.id,
                "Product registered"
            );
            return Ok(RegisterOutcome {
                created: true,
                product,
            });
        }

        let existing: RegisteredProduct = sqlx::query_as(
            r#"
            SELECT id, project_name, plan_name, stripe_product_id, stripe_price_id,
                   created_at, updated_at
            FROM registered_products
            WHERE project_name = $1 AND plan_name = $2
            "#,
        )
        .bind(project_name)
        .bind(plan_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(RegisterOutcome {
            created: false,
            product: existing,
        })
    }

    /// Enumerate everything registered under a project name.
    pub async fn list(&self, project_name: &str) -> BillingResult<Vec<RegisteredProduct>> {
        let products: Vec<RegisteredProduct> = sqlx::query_as(
            r#"
            SELECT id, project_name, plan_name, stripe_product_id, stripe_price_id,
                   created_at, updated_at
            FROM registered_products
            WHERE project_name = $1
            ORDER BY plan_name
            "#,
        )
        .bind(project_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}
