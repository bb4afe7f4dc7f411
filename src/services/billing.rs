// Billing service
// Stripe customer provisioning, checkout/portal sessions and the public catalog

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::db::{DieselConnection, DieselPool};
use crate::models::{SubscriptionStatus, User, UserError};
use crate::services::stripe::{
    CreateCheckoutSession, CreateCustomer, Price, Product, StripeApi, StripeError,
};
use crate::utils::ServiceError;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("User not found")]
    UserNotFound,

    #[error("Could not create customer")]
    CustomerCreation(#[source] StripeError),

    #[error("Could not create checkout session")]
    CheckoutSession(#[source] StripeError),

    #[error("Could not create billing portal session")]
    PortalSession(#[source] StripeError),

    #[error("Could not load billing catalog")]
    Catalog(#[source] StripeError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<UserError> for BillingError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound => BillingError::UserNotFound,
            other => BillingError::Database(other.to_string()),
        }
    }
}

impl From<BillingError> for ServiceError {
    fn from(error: BillingError) -> Self {
        match &error {
            BillingError::UserNotFound => ServiceError::NotFound(error.to_string()),
            BillingError::Database(msg) => ServiceError::DatabaseError(msg.clone()),
            BillingError::CustomerCreation(source)
            | BillingError::CheckoutSession(source)
            | BillingError::PortalSession(source)
            | BillingError::Catalog(source) => {
                error!(error = %source, "[BILLING] {}", error);
                ServiceError::Upstream(error.to_string())
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub id: String,
    pub product_id: String,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub interval: Option<String>,
    pub trial_period_days: Option<u32>,
}

impl From<&Price> for PriceSummary {
    fn from(price: &Price) -> Self {
        Self {
            id: price.id.clone(),
            product_id: price.product.id().to_string(),
            unit_amount: price.unit_amount,
            currency: price.currency.clone(),
            interval: price.recurring.as_ref().map(|r| r.interval.clone()),
            trial_period_days: price.recurring.as_ref().and_then(|r| r.trial_period_days),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub default_price_id: Option<String>,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            default_price_id: product.default_price.as_ref().map(|p| p.id().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_status: Option<SubscriptionStatus>,
    pub is_active: bool,
}

impl From<&User> for SubscriptionSummary {
    fn from(user: &User) -> Self {
        Self {
            stripe_customer_id: user.stripe_customer_id.clone(),
            stripe_subscription_id: user.stripe_subscription_id.clone(),
            stripe_subscription_status: user.stripe_subscription_status,
            is_active: user.has_active_subscription(),
        }
    }
}

#[derive(Clone)]
pub struct BillingService {
    pool: DieselPool,
    stripe: Arc<dyn StripeApi>,
    price_id: String,
}

impl BillingService {
    pub fn new(pool: DieselPool, stripe: Arc<dyn StripeApi>, price_id: String) -> Self {
        Self {
            pool,
            stripe,
            price_id,
        }
    }

    async fn conn(&self) -> Result<DieselConnection<'_>, BillingError> {
        self.pool
            .get()
            .await
            .map_err(|e| BillingError::Database(format!("Connection pool error: {}", e)))
    }

    /// Return the user's Stripe customer id, creating the customer on first use.
    ///
    /// The create call carries a per-user idempotency key and the id is stored with a
    /// conditional update, so concurrent first calls settle on one customer.
    #[instrument(skip(self))]
    pub async fn get_or_create_customer_id(&self, user_id: Uuid) -> Result<String, BillingError> {
        let user = {
            let mut conn = self.conn().await?;
            User::find_by_id(&mut conn, user_id).await?
        };

        if let Some(customer_id) = user.stripe_customer_id {
            return Ok(customer_id);
        }

        let customer = self
            .stripe
            .create_customer(CreateCustomer {
                user_id,
                email: user.email.clone(),
                name: user.name.clone(),
            })
            .await
            .map_err(BillingError::CustomerCreation)?;

        let mut conn = self.conn().await?;
        let stored = User::set_stripe_customer_id_if_absent(&mut conn, user_id, &customer.id).await?;

        match stored {
            Some(customer_id) => {
                info!(user_id = %user_id, customer_id = %customer_id, "[BILLING] Stripe customer linked");
                Ok(customer_id)
            },
            None => Err(BillingError::CustomerCreation(StripeError::Decode(
                "customer id was not persisted".to_string(),
            ))),
        }
    }

    /// Start a subscription checkout for the user; returns the hosted checkout URL
    #[instrument(skip(self, base_url))]
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        base_url: &str,
    ) -> Result<String, BillingError> {
        let customer_id = self.get_or_create_customer_id(user_id).await?;

        let session = self
            .stripe
            .create_checkout_session(CreateCheckoutSession {
                customer_id,
                user_id,
                price_id: self.price_id.clone(),
                success_url: format!("{}/u/@{}?success=true", base_url, user_id),
                cancel_url: format!("{}/u/@{}?success=false", base_url, user_id),
            })
            .await
            .map_err(BillingError::CheckoutSession)?;

        session.url.ok_or_else(|| {
            BillingError::CheckoutSession(StripeError::Decode(
                "checkout session has no url".to_string(),
            ))
        })
    }

    /// Open the Stripe billing portal; returns the portal URL
    #[instrument(skip(self, base_url))]
    pub async fn create_billing_portal_session(
        &self,
        user_id: Uuid,
        base_url: &str,
    ) -> Result<String, BillingError> {
        let customer_id = self.get_or_create_customer_id(user_id).await?;

        let session = self
            .stripe
            .create_billing_portal_session(&customer_id, &format!("{}/dashboard", base_url))
            .await
            .map_err(BillingError::PortalSession)?;

        Ok(session.url)
    }

    pub async fn list_prices(&self) -> Result<Vec<PriceSummary>, BillingError> {
        let prices = self
            .stripe
            .list_prices()
            .await
            .map_err(BillingError::Catalog)?;
        Ok(prices.iter().map(PriceSummary::from).collect())
    }

    pub async fn list_products(&self) -> Result<Vec<ProductSummary>, BillingError> {
        let products = self
            .stripe
            .list_products()
            .await
            .map_err(BillingError::Catalog)?;
        Ok(products.iter().map(ProductSummary::from).collect())
    }

    pub async fn subscription(&self, user_id: Uuid) -> Result<SubscriptionSummary, BillingError> {
        let mut conn = self.conn().await?;
        let user = User::find_by_id(&mut conn, user_id).await?;
        Ok(SubscriptionSummary::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::sample_user;
    use crate::services::stripe::{Expandable, Recurring};

    #[test]
    fn test_price_summary_mapping() {
        let price = Price {
            id: "price_1".into(),
            product: Expandable::Id("prod_1".into()),
            unit_amount: Some(900),
            currency: "usd".into(),
            recurring: Some(Recurring {
                interval: "month".into(),
                trial_period_days: None,
            }),
        };

        let json = serde_json::to_value(PriceSummary::from(&price)).unwrap();
        assert_eq!(json["productId"], "prod_1");
        assert_eq!(json["unitAmount"], 900);
        assert_eq!(json["interval"], "month");
        assert!(json["trialPeriodDays"].is_null());
    }

    #[test]
    fn test_product_summary_without_default_price() {
        let product = Product {
            id: "prod_1".into(),
            name: "Pro".into(),
            description: None,
            default_price: None,
        };
        let summary = ProductSummary::from(&product);
        assert_eq!(summary.default_price_id, None);
        assert_eq!(summary.name, "Pro");
    }

    #[test]
    fn test_subscription_summary_is_active() {
        let mut user = sample_user();
        user.stripe_subscription_status = Some(SubscriptionStatus::Trialing);
        assert!(SubscriptionSummary::from(&user).is_active);

        user.stripe_subscription_status = Some(SubscriptionStatus::Canceled);
        assert!(!SubscriptionSummary::from(&user).is_active);
    }

    #[test]
    fn test_billing_errors_map_to_upstream_messages() {
        let err: ServiceError =
            BillingError::CheckoutSession(StripeError::Decode("x".into())).into();
        assert!(matches!(err, ServiceError::Upstream(ref m) if m == "Could not create checkout session"));

        let err: ServiceError = BillingError::UserNotFound.into();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "User not found"));
    }
}
