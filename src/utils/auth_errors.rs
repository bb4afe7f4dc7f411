// Authentication-specific error handling utilities

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use thiserror::Error;

use crate::models::{SessionError, UserError, VerificationTokenError};

/// Authentication-specific errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    ValidationError(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Too many requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("OAuth sign-in failed: {0}")]
    OAuth(String),

    #[error("Unknown or disabled OAuth provider")]
    UnknownProvider,

    #[error("An account with this email already exists; sign in with your original method")]
    AccountNotLinked,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    InternalError,
}

/// Standard authentication response structure
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl AuthError {
    /// Convert to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::OAuth(_) => StatusCode::BAD_REQUEST,
            AuthError::UnknownProvider => StatusCode::NOT_FOUND,
            AuthError::AccountNotLinked => StatusCode::CONFLICT,
            AuthError::InvalidToken => StatusCode::BAD_REQUEST,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::ValidationError(_) => "VALIDATION_ERROR",
            AuthError::EmailTaken => "EMAIL_TAKEN",
            AuthError::Unauthorized => "UNAUTHORIZED",
            AuthError::RateLimited { .. } => "RATE_LIMITED",
            AuthError::OAuth(_) => "OAUTH_ERROR",
            AuthError::UnknownProvider => "UNKNOWN_PROVIDER",
            AuthError::AccountNotLinked => "ACCOUNT_NOT_LINKED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::DatabaseError(_) => "DATABASE_ERROR",
            AuthError::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get retry_after value if applicable
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AuthError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Message shown to the client. Database details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AuthError::DatabaseError(_) => "Database error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        if let AuthError::DatabaseError(msg) = &self {
            tracing::error!(error = %msg, "[AUTH] Database error");
        }

        let status = self.status_code();
        let message = self.public_message();
        let response = AuthErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.error_code().to_string(),
                description: message.clone(),
                retry_after: self.retry_after(),
            },
            message,
        };

        let mut response = (status, Json(response)).into_response();
        if let Some(seconds) = self.retry_after() {
            if let Ok(value) = seconds.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<diesel::result::Error> for AuthError {
    fn from(error: diesel::result::Error) -> Self {
        AuthError::DatabaseError(error.to_string())
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for AuthError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        AuthError::DatabaseError(format!("Connection pool error: {}", error))
    }
}

impl From<UserError> for AuthError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound => AuthError::Unauthorized,
            UserError::EmailTaken => AuthError::EmailTaken,
            UserError::Database(e) => AuthError::DatabaseError(e.to_string()),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotFound | SessionError::Expired => AuthError::Unauthorized,
            SessionError::Database(e) => AuthError::DatabaseError(e.to_string()),
        }
    }
}

impl From<VerificationTokenError> for AuthError {
    fn from(error: VerificationTokenError) -> Self {
        match error {
            VerificationTokenError::Invalid => AuthError::InvalidToken,
            VerificationTokenError::Database(e) => AuthError::DatabaseError(e.to_string()),
        }
    }
}

impl From<crate::utils::PasswordError> for AuthError {
    fn from(error: crate::utils::PasswordError) -> Self {
        tracing::error!(error = %error, "[AUTH] Password hashing failed");
        AuthError::InternalError
    }
}

/// Helper function to log authentication failures
pub fn log_auth_failure(
    user_email: &str,
    ip_address: &str,
    error: &AuthError,
    user_agent: Option<&str>,
) {
    tracing::warn!(
        email = user_email,
        ip = ip_address,
        user_agent = user_agent.unwrap_or("unknown"),
        error_code = error.error_code(),
        "Authentication failure"
    );
}
