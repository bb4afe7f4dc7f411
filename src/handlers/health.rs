use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::{app::AppState, db};

/// GET /health - Database reachability
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let pool_state = state.diesel_pool.state();

    let (healthy, postgres_health) = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => (
            true,
            json!({
                "status": "healthy",
                "connections": pool_state.connections,
                "idle_connections": pool_state.idle_connections,
                "error": null
            }),
        ),
        Err(e) => (
            false,
            json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            }),
        ),
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "service": "saas-starter",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health
        }
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
