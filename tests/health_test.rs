use axum::http::StatusCode;
use serde_json::Value;
use serial_test::serial;

mod common;
use common::{setup_offline_app, setup_test_app};

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let app = setup_offline_app(&[]);
    let response = app.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json().await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["service"], "saas-starter");
    assert_eq!(body["components"]["postgresql"]["status"], "unhealthy");
}

#[tokio::test]
#[serial]
async fn test_health_ok() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let response = app.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}
