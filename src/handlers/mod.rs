pub mod activity;
pub mod auth;
pub mod billing;
pub mod clients;
pub mod health;
pub mod oauth;
pub mod users;
pub mod webhooks;

use crate::app::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

// Credential routes that are rate limited per client IP
pub fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-email", post(auth::verify_email))
}

// Authentication routes that need a session
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::get_current_user))
        .route("/verification", post(auth::request_verification))
}

// OAuth sign-in
pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/{provider}", get(oauth::authorize))
        .route("/{provider}/callback", get(oauth::callback))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/{id}", get(users::get_user))
}

// Billing routes that need a session
pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout-session", post(billing::create_checkout_session))
        .route("/portal-session", post(billing::create_billing_portal_session))
        .route("/subscription", get(billing::get_subscription))
}

// Public catalog
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/prices", get(billing::list_prices))
        .route("/products", get(billing::list_products))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/stripe", post(webhooks::stripe_webhook))
}

pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route("/{id}", delete(clients::delete_client))
}

pub fn activity_routes() -> Router<AppState> {
    Router::new().route("/", get(activity::list_activity))
}
