// Middleware modules: session authentication, client IP, auth rate limiting, CORS

pub mod auth;
pub mod auth_middleware;
pub mod client_ip;
pub mod cors;
pub mod rate_limit;

// Re-export auth types
pub use auth::AuthenticatedUser;
pub use auth_middleware::{auth_middleware, extract_session_token, SESSION_COOKIE};
pub use client_ip::ClientIp;
pub use cors::dynamic_cors_middleware;
pub use rate_limit::auth_rate_limit_middleware;
