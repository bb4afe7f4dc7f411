// Stripe REST client
// Form-encoded requests against api.stripe.com, behind a trait so handlers and tests
// can swap the transport.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::app_config::StripeConfig;
use crate::models::SubscriptionStatus;

pub const STRIPE_API_VERSION: &str = "2025-01-27.acacia";

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode Stripe response: {0}")]
    Decode(String),
}

// =============================================================================
// API OBJECTS
// =============================================================================

/// A field Stripe returns either as an id or, when expanded, as the full object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

pub trait HasId {
    fn object_id(&self) -> &str;
}

impl<T: HasId> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(object) => object.object_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingPortalSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl HasId for Subscription {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recurring {
    pub interval: String,
    #[serde(default)]
    pub trial_period_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub id: String,
    pub product: Expandable<Product>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    pub currency: String,
    #[serde(default)]
    pub recurring: Option<Recurring>,
}

impl HasId for Price {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_price: Option<Expandable<Price>>,
}

impl HasId for Product {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSubscriptionDetails {
    #[serde(default)]
    pub subscription: Option<Expandable<Subscription>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceParent {
    #[serde(default)]
    pub subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<Expandable<Subscription>>,
    #[serde(default)]
    pub parent: Option<InvoiceParent>,
}

impl Invoice {
    /// Subscription id on the invoice. Newer API versions only carry it under
    /// `parent.subscription_details`.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|p| p.subscription_details.as_ref())
                    .and_then(|d| d.subscription.as_ref())
            })
            .map(|s| s.id())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// REQUEST PARAMETERS
// =============================================================================

#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl CreateCustomer {
    pub fn idempotency_key(&self) -> String {
        format!("customer-create-{}", self.user_id)
    }

    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("email".to_string(), self.email.clone()),
            ("metadata[userId]".to_string(), self.user_id.to_string()),
        ];
        if let Some(name) = &self.name {
            form.push(("name".to_string(), name.clone()));
        }
        form
    }
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutSession {
    pub customer_id: String,
    pub user_id: Uuid,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CreateCheckoutSession {
    pub fn to_form(&self) -> Vec<(String, String)> {
        let user_id = self.user_id.to_string();
        vec![
            ("customer".to_string(), self.customer_id.clone()),
            ("client_reference_id".to_string(), user_id.clone()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), self.price_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("subscription_data[metadata][userId]".to_string(), user_id),
        ]
    }
}

// =============================================================================
// API TRAIT
// =============================================================================

#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn create_customer(&self, params: CreateCustomer) -> Result<Customer, StripeError>;

    async fn create_checkout_session(
        &self,
        params: CreateCheckoutSession,
    ) -> Result<CheckoutSession, StripeError>;

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<BillingPortalSession, StripeError>;

    async fn retrieve_subscription(&self, subscription_id: &str)
        -> Result<Subscription, StripeError>;

    /// Active recurring prices with their product expanded
    async fn list_prices(&self) -> Result<Vec<Price>, StripeError>;

    /// Active products with their default price expanded
    async fn list_products(&self) -> Result<Vec<Product>, StripeError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct StripeClient {
    http_client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("saas-starter/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .form(form);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        Self::decode(request.send().await?).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        let response = self
            .http_client
            .get(self.url(path))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .query(query)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StripeError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| StripeError::Decode(e.to_string()))
    }
}

fn api_error(status: StatusCode, body: &str) -> StripeError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    warn!(status = status.as_u16(), message = %message, "[STRIPE] API request rejected");
    StripeError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl StripeApi for StripeClient {
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    async fn create_customer(&self, params: CreateCustomer) -> Result<Customer, StripeError> {
        let key = params.idempotency_key();
        let customer: Customer = self
            .post_form("customers", &params.to_form(), Some(&key))
            .await?;
        debug!(customer_id = %customer.id, "[STRIPE] Customer created");
        Ok(customer)
    }

    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    async fn create_checkout_session(
        &self,
        params: CreateCheckoutSession,
    ) -> Result<CheckoutSession, StripeError> {
        self.post_form("checkout/sessions", &params.to_form(), None)
            .await
    }

    #[instrument(skip(self, return_url))]
    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<BillingPortalSession, StripeError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.post_form("billing_portal/sessions", &form, None).await
    }

    #[instrument(skip(self))]
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        self.get(&format!("subscriptions/{}", subscription_id), &[])
            .await
    }

    async fn list_prices(&self) -> Result<Vec<Price>, StripeError> {
        let list: List<Price> = self
            .get(
                "prices",
                &[
                    ("expand[]", "data.product"),
                    ("active", "true"),
                    ("type", "recurring"),
                ],
            )
            .await?;
        Ok(list.data)
    }

    async fn list_products(&self) -> Result<Vec<Product>, StripeError> {
        let list: List<Product> = self
            .get(
                "products",
                &[("active", "true"), ("expand[]", "data.default_price")],
            )
            .await?;
        Ok(list.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_price_with_expanded_product() {
        let price: Price = serde_json::from_value(json!({
            "id": "price_1",
            "object": "price",
            "product": {"id": "prod_1", "object": "product", "name": "Pro", "description": null},
            "unit_amount": 1500,
            "currency": "usd",
            "recurring": {"interval": "month", "trial_period_days": 14}
        }))
        .unwrap();

        assert_eq!(price.product.id(), "prod_1");
        assert_eq!(price.unit_amount, Some(1500));
        assert_eq!(price.recurring.unwrap().trial_period_days, Some(14));
    }

    #[test]
    fn test_product_default_price_as_id_or_object() {
        let by_id: Product = serde_json::from_value(json!({
            "id": "prod_1", "name": "Pro", "default_price": "price_1"
        }))
        .unwrap();
        assert_eq!(by_id.default_price.unwrap().id(), "price_1");

        let expanded: Product = serde_json::from_value(json!({
            "id": "prod_2",
            "name": "Team",
            "default_price": {"id": "price_2", "product": "prod_2", "currency": "eur"}
        }))
        .unwrap();
        assert_eq!(expanded.default_price.unwrap().id(), "price_2");
    }

    #[test]
    fn test_invoice_subscription_id_locations() {
        let legacy: Invoice = serde_json::from_value(json!({
            "id": "in_1", "subscription": "sub_1"
        }))
        .unwrap();
        assert_eq!(legacy.subscription_id(), Some("sub_1"));

        let nested: Invoice = serde_json::from_value(json!({
            "id": "in_2",
            "parent": {"subscription_details": {"subscription": "sub_2"}}
        }))
        .unwrap();
        assert_eq!(nested.subscription_id(), Some("sub_2"));

        let one_off: Invoice = serde_json::from_value(json!({"id": "in_3"})).unwrap();
        assert_eq!(one_off.subscription_id(), None);
    }

    #[test]
    fn test_checkout_form_carries_user_metadata() {
        let user_id = Uuid::new_v4();
        let form = CreateCheckoutSession {
            customer_id: "cus_1".into(),
            user_id,
            price_id: "price_1".into(),
            success_url: "https://app.test/u/@x?success=true".into(),
            cancel_url: "https://app.test/u/@x?success=false".into(),
        }
        .to_form();

        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("mode").as_deref(), Some("subscription"));
        assert_eq!(get("line_items[0][quantity]").as_deref(), Some("1"));
        assert_eq!(
            get("subscription_data[metadata][userId]"),
            Some(user_id.to_string())
        );
        assert_eq!(get("client_reference_id"), Some(user_id.to_string()));
    }

    #[test]
    fn test_customer_idempotency_key_is_per_user() {
        let user_id = Uuid::new_v4();
        let params = CreateCustomer {
            user_id,
            email: "a@b.co".into(),
            name: None,
        };
        assert_eq!(
            params.idempotency_key(),
            format!("customer-create-{}", user_id)
        );
        assert!(!params.to_form().iter().any(|(k, _)| k == "name"));
    }

    #[test]
    fn test_api_error_message_extraction() {
        let err = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"No such price","type":"invalid_request_error"}}"#,
        );
        assert!(matches!(
            err,
            StripeError::Api { status: 400, ref message } if message == "No such price"
        ));

        let err = api_error(StatusCode::BAD_GATEWAY, "<html>");
        assert!(matches!(err, StripeError::Api { status: 502, .. }));
    }
}
