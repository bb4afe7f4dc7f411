// Utility modules for the SaaS starter backend

pub mod auth_errors;
pub mod password;
pub mod service_error;
pub mod token;
pub mod validation;

pub use auth_errors::{log_auth_failure, AuthError, AuthErrorResponse};
pub use password::{hash_password, hash_random_password, verify_password, PasswordError};
pub use service_error::ServiceError;
pub use token::{hex_encode, random_hex_token};
pub use validation::{trim_optional_field, validate_credentials};
