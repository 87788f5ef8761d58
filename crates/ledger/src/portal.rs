//! Billing portal session creation.

use sqlx::PgPool;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::customers::CustomerService;
use crate::error::{BillingError, BillingResult};

#[derive(Debug, Clone, serde::Serialize)]
pub struct PortalResponse {
    pub portal_url: String,
}

#[derive(Clone)]
pub struct PortalService {
    stripe: StripeClient,
    pool: PgPool,
}

impl PortalService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Create a Stripe billing portal session for an end user.
    ///
    /// Requires the customer row to exist and to already carry a Stripe
    /// binding; a user who never completed a checkout has nothing to
    /// manage and gets `NoStripeCustomer`.
    pub async fn create_session(
        &self,
        project_id: Uuid,
        user_id: &str,
        return_url: &str,
    ) -> BillingResult<PortalResponse> {
        let customers = CustomerService::new(self.stripe.clone(), self.pool.clone());

        let row = customers
            .get_by_user(project_id, user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("customer {}", user_id)))?;

        let stripe_customer_id = row
            .stripe_customer_id
            .ok_or_else(|| BillingError::NoStripeCustomer(user_id.to_string()))?;

        let customer: stripe::CustomerId = stripe_customer_id.parse().map_err(|e| {
            BillingError::Internal(format!(
                "bound stripe customer id {} did not parse: {}",
                stripe_customer_id, e
            ))
        })?;

        let mut params = stripe::CreateBillingPortalSession::new(customer);
        params.return_url = Some(return_url);

        let session = stripe::BillingPortalSession::create(self.stripe.inner(), params).await?;

        tracing::info!(
            project_id = %project_id,
            user_id = %user_id,
            "Billing portal session created"
        );

        Ok(PortalResponse {
            portal_url: session.url,
        })
    }
}
