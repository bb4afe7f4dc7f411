// Integration tests for the Stripe webhook endpoint

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::Utc;
use saas_starter::{
    models::SubscriptionStatus,
    services::{stripe::Subscription, webhook::signature_header},
};
use serde_json::{json, Value};
use serial_test::serial;

mod common;
use common::{setup_offline_app, setup_test_app, unique_email, TestApp, WEBHOOK_SECRET};

fn subscription_event(event_type: &str, user_id: &str, status: &str) -> Value {
    json!({
        "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": "sub_test_123",
                "object": "subscription",
                "status": status,
                "metadata": { "userId": user_id }
            }
        }
    })
}

async fn deliver(app: &TestApp, event: &Value) -> (StatusCode, Value) {
    let payload = serde_json::to_vec(event).unwrap();
    let signature = signature_header(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
    let response = app
        .post("/v1/webhooks/stripe")
        .header("stripe-signature", &signature)
        .header("content-type", "application/json")
        .raw_body(payload)
        .send()
        .await;
    let status = response.status();
    (status, response.json().await)
}

// =============================================================================
// SIGNATURES (no database needed)
// =============================================================================

#[tokio::test]
async fn test_rejects_missing_and_forged_signatures() {
    let app = setup_offline_app(&[]);
    let payload = serde_json::to_vec(&subscription_event(
        "customer.subscription.updated",
        &uuid::Uuid::new_v4().to_string(),
        "active",
    ))
    .unwrap();

    let missing = app
        .post("/v1/webhooks/stripe")
        .raw_body(payload.clone())
        .send()
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let forged = signature_header(&payload, "whsec_wrong", Utc::now().timestamp());
    let response = app
        .post("/v1/webhooks/stripe")
        .header("stripe-signature", &forged)
        .raw_body(payload.clone())
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "Invalid webhook signature");

    let stale = signature_header(&payload, WEBHOOK_SECRET, Utc::now().timestamp() - 3600);
    let response = app
        .post("/v1/webhooks/stripe")
        .header("stripe-signature", &stale)
        .raw_body(payload)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_database_outage_asks_stripe_to_retry() {
    let app = setup_offline_app(&[]);
    let event = subscription_event(
        "customer.subscription.updated",
        &uuid::Uuid::new_v4().to_string(),
        "active",
    );

    let (status, _) = deliver(&app, &event).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// RECONCILIATION
// =============================================================================

#[tokio::test]
#[serial]
async fn test_subscription_update_touches_only_target_user() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let target = app.create_user(&unique_email("target"), "password123").await;
    let bystander = app.create_user(&unique_email("bystander"), "password123").await;

    let event = subscription_event(
        "customer.subscription.updated",
        &target.id.to_string(),
        "past_due",
    );
    let (status, body) = deliver(&app, &event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let target_before = target.updated_at;
    let target = app.reload_user(target.id).await;
    assert_eq!(target.stripe_subscription_id.as_deref(), Some("sub_test_123"));
    assert!(target.updated_at > target_before);
    assert_eq!(
        target.stripe_subscription_status,
        Some(SubscriptionStatus::PastDue)
    );

    let bystander_after = app.reload_user(bystander.id).await;
    assert_eq!(bystander_after.stripe_subscription_id, None);
    assert_eq!(bystander_after.stripe_subscription_status, None);
    assert_eq!(bystander_after.updated_at, bystander.updated_at);
}

#[tokio::test]
#[serial]
async fn test_subscription_deleted_clears_columns() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let user = app.create_user(&unique_email("deleted"), "password123").await;
    let user_id = user.id.to_string();

    deliver(&app, &subscription_event("customer.subscription.created", &user_id, "active")).await;
    assert!(app.reload_user(user.id).await.has_active_subscription());

    let (status, _) = deliver(
        &app,
        &subscription_event("customer.subscription.deleted", &user_id, "canceled"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let user = app.reload_user(user.id).await;
    assert_eq!(user.stripe_subscription_id, None);
    assert_eq!(user.stripe_subscription_status, None);
}

#[tokio::test]
#[serial]
async fn test_invoice_paid_retrieves_subscription() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let user = app.create_user(&unique_email("invoice"), "password123").await;
    app.stripe.insert_subscription(Subscription {
        id: "sub_from_invoice".to_string(),
        status: SubscriptionStatus::Active,
        metadata: HashMap::from([("userId".to_string(), user.id.to_string())]),
    });

    let event = json!({
        "id": "evt_invoice",
        "type": "invoice.paid",
        "data": { "object": {
            "id": "in_123",
            "parent": { "subscription_details": { "subscription": "sub_from_invoice" } }
        } }
    });
    let (status, _) = deliver(&app, &event).await;
    assert_eq!(status, StatusCode::OK);

    let user = app.reload_user(user.id).await;
    assert_eq!(user.stripe_subscription_id.as_deref(), Some("sub_from_invoice"));
    assert_eq!(user.stripe_subscription_status, Some(SubscriptionStatus::Active));
}

#[tokio::test]
#[serial]
async fn test_events_without_user_or_of_other_types_are_acknowledged() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let no_user = json!({
        "id": "evt_no_user",
        "type": "customer.subscription.updated",
        "data": { "object": { "id": "sub_x", "status": "active", "metadata": {} } }
    });
    let (status, body) = deliver(&app, &no_user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let other = json!({
        "id": "evt_other",
        "type": "charge.refunded",
        "data": { "object": { "id": "ch_1" } }
    });
    let (status, _) = deliver(&app, &other).await;
    assert_eq!(status, StatusCode::OK);
}
