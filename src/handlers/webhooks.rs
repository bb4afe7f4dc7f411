// Stripe webhook endpoint

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{
    app::AppState,
    services::{
        stripe::Event,
        webhook::{handle_event, verify_signature},
        WebhookError, WebhookOutcome,
    },
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfTolerance
            | WebhookError::Payload(_) => {
                warn!(error = %self, "[WEBHOOK] Rejected");
                StatusCode::BAD_REQUEST
            },
            // 5xx so Stripe retries delivery
            WebhookError::Database(_) | WebhookError::Stripe(_) => {
                error!(error = %self, "[WEBHOOK] Handling failed");
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };

        let message = match &self {
            WebhookError::Database(_) => "Database error".to_string(),
            WebhookError::Stripe(_) => "Payment provider request failed".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message, "status": status.as_u16() }))).into_response()
    }
}

/// POST /v1/webhooks/stripe
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    verify_signature(
        &body,
        signature,
        &state.config.stripe.webhook_secret,
        state.config.stripe.webhook_tolerance_secs,
    )?;

    let event: Event =
        serde_json::from_slice(&body).map_err(|e| WebhookError::Payload(e.to_string()))?;

    let outcome = {
        let mut conn = state
            .diesel_pool
            .get()
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;
        handle_event(&mut conn, state.stripe.as_ref(), &event).await?
    };

    if let WebhookOutcome::Applied { rows: 0, user_id } = outcome {
        warn!(event_id = %event.id, user_id = %user_id, "[WEBHOOK] Event references an unknown user");
    }

    Ok(Json(json!({ "received": true })))
}
