// Billing handlers: Stripe checkout, billing portal, catalog and subscription state

use axum::{
    extract::{Extension, State},
    http::{header, HeaderMap},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::{
    app::AppState,
    middleware::{AuthenticatedUser, ClientIp},
    models::ActivityType,
    services::{record_activity, PriceSummary, ProductSummary, SubscriptionSummary},
    utils::ServiceError,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPortalResponse {
    pub billing_portal_url: String,
}

fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    state.config.base_url(host)
}

/// POST /v1/billing/checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    client_ip: ClientIp,
    headers: HeaderMap,
) -> Result<Json<CheckoutSessionResponse>, ServiceError> {
    let checkout_url = state
        .billing_service
        .create_checkout_session(auth_user.user_id, &base_url(&state, &headers))
        .await?;

    info!(user_id = %auth_user.user_id, "[BILLING] Checkout session created");
    record_activity(
        &state.diesel_pool,
        auth_user.user_id,
        ActivityType::CheckoutStarted,
        client_ip.0,
    )
    .await;

    Ok(Json(CheckoutSessionResponse { checkout_url }))
}

/// POST /v1/billing/portal-session
pub async fn create_billing_portal_session(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    client_ip: ClientIp,
    headers: HeaderMap,
) -> Result<Json<BillingPortalResponse>, ServiceError> {
    let billing_portal_url = state
        .billing_service
        .create_billing_portal_session(auth_user.user_id, &base_url(&state, &headers))
        .await?;

    record_activity(
        &state.diesel_pool,
        auth_user.user_id,
        ActivityType::BillingPortalOpened,
        client_ip.0,
    )
    .await;

    Ok(Json(BillingPortalResponse { billing_portal_url }))
}

/// GET /v1/billing/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<SubscriptionSummary>, ServiceError> {
    Ok(Json(
        state.billing_service.subscription(auth_user.user_id).await?,
    ))
}

/// GET /v1/billing/prices
pub async fn list_prices(
    State(state): State<AppState>,
) -> Result<Json<Vec<PriceSummary>>, ServiceError> {
    Ok(Json(state.billing_service.list_prices().await?))
}

/// GET /v1/billing/products
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductSummary>>, ServiceError> {
    Ok(Json(state.billing_service.list_products().await?))
}
