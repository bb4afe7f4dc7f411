// Authentication middleware for protected routes
// Resolves the session cookie or bearer token and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{Session, User},
    utils::AuthError,
};

pub const SESSION_COOKIE: &str = "session_token";

/// Session token from the `session_token` cookie, falling back to `Authorization: Bearer`
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

async fn resolve_user(app_state: &AppState, token: &str) -> Result<AuthenticatedUser, AuthError> {
    let mut conn = app_state.diesel_pool.get().await?;
    let session = Session::find_valid(&mut conn, token).await?;
    let user = User::find_by_id(&mut conn, session.user_id).await?;

    Ok(AuthenticatedUser {
        user_id: user.id,
        email: user.email,
        role: user.role,
        session_token: token.to_string(),
    })
}

/// Middleware function that validates the session and adds AuthenticatedUser to extensions
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_session_token(request.headers()) else {
        return AuthError::Unauthorized.into_response();
    };

    match resolve_user(&app_state, &token).await {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        },
        Err(e) => {
            tracing::debug!(error = %e, "[AUTH] Session rejected");
            e.into_response()
        },
    }
}

/// Extractor for AuthenticatedUser from request extensions
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_token=from-cookie"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );

        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn test_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_no_credentials() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }
}
