// Client IP extraction: the socket peer address, or the first X-Forwarded-For hop
// when the deployment sits behind a trusted proxy

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use crate::app::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        let forwarded = trust_proxy
            .then(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(String::from)
            })
            .flatten();

        ClientIp(forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())))
    }

    /// Key used for rate limiting and logs
    pub fn as_key(&self) -> &str {
        self.0.as_deref().unwrap_or("unknown")
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp::from_parts(
            &parts.headers,
            peer,
            state.config.server.trust_proxy_headers,
        ))
    }
}
