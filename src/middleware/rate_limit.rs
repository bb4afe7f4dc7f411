// Per-IP rate limiting for credential endpoints

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app::AppState, middleware::ClientIp, utils::AuthError};

pub async fn auth_rate_limit_middleware(
    State(app_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = ClientIp::from_parts(
        request.headers(),
        peer,
        app_state.config.server.trust_proxy_headers,
    );

    let result = app_state
        .rate_limiter
        .check(request.uri().path(), client_ip.as_key());

    if !result.allowed {
        return AuthError::RateLimited {
            retry_after_seconds: result.retry_after.unwrap_or(60),
        }
        .into_response();
    }

    next.run(request).await
}
