// Library exports for the SaaS starter backend
// Exposes the modules, the router and state initialization to the binary and integration tests

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// Re-export commonly used types
pub use app::AppState;
pub use app_config::AppConfig;
pub use db::DieselPool;
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use services::{LogNotifier, StripeApi, StripeClient, VerificationNotifier};

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let require_session = from_fn_with_state(state.clone(), middleware::auth_middleware);
    let rate_limit = from_fn_with_state(state.clone(), middleware::auth_rate_limit_middleware);

    let auth = Router::new()
        .merge(handlers::credential_routes().route_layer(rate_limit))
        .merge(handlers::session_routes().route_layer(require_session.clone()))
        .nest("/oauth", handlers::oauth_routes());

    let billing = handlers::billing_routes()
        .route_layer(require_session.clone())
        .merge(handlers::catalog_routes());

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/v1/auth", auth)
        .nest("/v1/users", handlers::user_routes())
        .nest("/v1/billing", billing)
        .nest("/v1/webhooks", handlers::webhook_routes())
        .nest(
            "/v1/clients",
            handlers::client_routes().route_layer(require_session.clone()),
        )
        .nest(
            "/v1/activity",
            handlers::activity_routes().route_layer(require_session),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::dynamic_cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the pool, apply migrations and assemble the application state
pub async fn initialize_app_state(
    config: AppConfig,
) -> Result<AppState, Box<dyn std::error::Error>> {
    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::from_config(&config.database);
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    if migrations::should_run_migrations(&config) {
        info!("Running embedded migrations...");
        migrations::run_all_migrations(migrations::MigrationConfig::from_config(&config))
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    } else {
        match migrations::diesel::check_migration_status(config.database.url.clone()).await {
            Ok(status) if !status.is_up_to_date() => warn!(
                pending = ?status.pending_migrations,
                "[MIGRATIONS] Embedded migrations disabled and migrations are pending"
            ),
            Ok(status) => info!(applied = status.applied_count, "[MIGRATIONS] Schema up to date"),
            Err(e) => warn!(error = %e, "[MIGRATIONS] Could not read migration status"),
        }
    }

    let stripe: Arc<dyn StripeApi> = Arc::new(StripeClient::new(&config.stripe));
    let notifier: Arc<dyn VerificationNotifier> = Arc::new(LogNotifier);

    let state = AppState::new(diesel_pool, Arc::new(config), stripe, notifier);
    info!(
        oauth_providers = ?state.oauth_providers.enabled(),
        "Application state initialized"
    );
    Ok(state)
}
