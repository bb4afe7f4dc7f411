// Stripe webhook verification and subscription reconciliation

use chrono::Utc;
use diesel_async::AsyncPgConnection;
use ring::hmac;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{SubscriptionStatus, User, UserError};
use crate::services::stripe::{Event, Invoice, StripeApi, StripeError, Subscription};
use crate::utils::hex_encode;

pub const INVOICE_PAID: &str = "invoice.paid";
pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing Stripe-Signature header")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("Invalid webhook payload: {0}")]
    Payload(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),
}

impl From<UserError> for WebhookError {
    fn from(error: UserError) -> Self {
        WebhookError::Database(error.to_string())
    }
}

// =============================================================================
// SIGNATURE VERIFICATION
// =============================================================================

fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);
    hex_encode(hmac::sign(&key, &signed).as_ref())
}

/// Build a `Stripe-Signature` header value for `payload`
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_signature(payload, secret, timestamp)
    )
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against the raw body
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    verify_signature_at(payload, header, secret, tolerance_secs, Utc::now().timestamp())
}

pub fn verify_signature_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {},
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature);
    }

    let expected = compute_signature(payload, secret, timestamp);
    let matched = signatures
        .iter()
        .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())));
    if !matched {
        return Err(WebhookError::InvalidSignature);
    }

    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    Ok(())
}

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Column change derived from a subscription object
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionSync {
    Set {
        user_id: Uuid,
        subscription_id: String,
        status: SubscriptionStatus,
    },
    Clear {
        user_id: Uuid,
    },
}

impl SubscriptionSync {
    /// `None` when the subscription is not tagged with a valid `metadata.userId`
    pub fn from_subscription(subscription: &Subscription, deleted: bool) -> Option<Self> {
        let user_id = subscription
            .metadata
            .get("userId")
            .and_then(|id| Uuid::parse_str(id).ok())?;

        if deleted {
            Some(SubscriptionSync::Clear { user_id })
        } else {
            Some(SubscriptionSync::Set {
                user_id,
                subscription_id: subscription.id.clone(),
                status: subscription.status,
            })
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            SubscriptionSync::Set { user_id, .. } | SubscriptionSync::Clear { user_id } => {
                *user_id
            },
        }
    }

    pub async fn apply(&self, conn: &mut AsyncPgConnection) -> Result<usize, UserError> {
        match self {
            SubscriptionSync::Set {
                user_id,
                subscription_id,
                status,
            } => User::update_subscription(conn, *user_id, Some(subscription_id), Some(*status))
                .await,
            SubscriptionSync::Clear { user_id } => {
                User::update_subscription(conn, *user_id, None, None).await
            },
        }
    }
}

/// What handling an event amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied { user_id: Uuid, rows: usize },
    NoUser,
    Ignored,
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &Event) -> Result<T, WebhookError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| WebhookError::Payload(format!("{}: {}", event.event_type, e)))
}

/// Resolve an event to the column change it implies, calling Stripe when the
/// event only references the subscription.
pub async fn resolve_event(
    stripe: &dyn StripeApi,
    event: &Event,
) -> Result<Option<SubscriptionSync>, WebhookError> {
    match event.event_type.as_str() {
        INVOICE_PAID => {
            let invoice: Invoice = parse_object(event)?;
            let Some(subscription_id) = invoice.subscription_id() else {
                debug!(invoice_id = %invoice.id, "[WEBHOOK] Invoice has no subscription");
                return Ok(None);
            };
            let subscription = stripe.retrieve_subscription(subscription_id).await?;
            Ok(SubscriptionSync::from_subscription(&subscription, false))
        },
        SUBSCRIPTION_CREATED | SUBSCRIPTION_UPDATED => {
            let subscription: Subscription = parse_object(event)?;
            Ok(SubscriptionSync::from_subscription(&subscription, false))
        },
        SUBSCRIPTION_DELETED => {
            let subscription: Subscription = parse_object(event)?;
            Ok(SubscriptionSync::from_subscription(&subscription, true))
        },
        _ => Ok(None),
    }
}

pub fn is_handled_event(event_type: &str) -> bool {
    matches!(
        event_type,
        INVOICE_PAID | SUBSCRIPTION_CREATED | SUBSCRIPTION_UPDATED | SUBSCRIPTION_DELETED
    )
}

/// Handle one verified event end to end
pub async fn handle_event(
    conn: &mut AsyncPgConnection,
    stripe: &dyn StripeApi,
    event: &Event,
) -> Result<WebhookOutcome, WebhookError> {
    if !is_handled_event(&event.event_type) {
        debug!(event_id = %event.id, event_type = %event.event_type, "[WEBHOOK] Ignoring event");
        return Ok(WebhookOutcome::Ignored);
    }

    let Some(sync) = resolve_event(stripe, event).await? else {
        warn!(event_id = %event.id, event_type = %event.event_type, "[WEBHOOK] No userId in subscription metadata");
        return Ok(WebhookOutcome::NoUser);
    };

    let user_id = sync.user_id();
    let rows = sync.apply(conn).await?;
    info!(
        event_id = %event.id,
        event_type = %event.event_type,
        user_id = %user_id,
        rows,
        "[WEBHOOK] Subscription state synced"
    );

    Ok(WebhookOutcome::Applied { user_id, rows })
}
