// OAuth sign-in handlers: redirect to the provider, then handle its callback

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    app::AppState,
    app_config::AppConfig,
    handlers::auth::open_session,
    middleware::ClientIp,
    models::ActivityType,
    services::{
        oauth::{sign_in_with_profile, OAUTH_STATE_COOKIE, OAUTH_STATE_TTL_SECS},
        OAuthError, OAuthStateClaims,
    },
    utils::AuthError,
};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Callback URL registered with the provider
fn redirect_uri(base_url: &str, provider: &str) -> String {
    format!("{}/v1/auth/oauth/{}/callback", base_url, provider)
}

fn request_base_url(config: &AppConfig, headers: &HeaderMap) -> String {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    config.base_url(host)
}

// SameSite=Lax so the cookie survives the top-level redirect back from the provider
fn state_cookie(value: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(OAUTH_STATE_TTL_SECS))
        .build()
}

fn clear_state_cookie() -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::seconds(-1))
        .build()
}

/// GET /auth/oauth/{provider} - Redirect to the provider's consent screen
pub async fn authorize(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let provider = state.oauth_providers.get(&provider_name)?;

    let claims = OAuthStateClaims::new(provider.name);
    let signed = claims.sign(&state.config.auth.secret)?;

    let callback = redirect_uri(&request_base_url(&state.config, &headers), provider.name);
    let location = provider.authorization_url(&callback, &claims.state, &claims.code_challenge())?;

    info!(provider = provider.name, "[OAUTH] Redirecting to provider");
    Ok((
        jar.add(state_cookie(signed, &state.config)),
        Redirect::to(&location),
    ))
}

/// GET /auth/oauth/{provider}/callback - Finish sign-in and redirect to the dashboard
pub async fn callback(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Query(query): Query<CallbackQuery>,
    client_ip: ClientIp,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let provider = state.oauth_providers.get(&provider_name)?;

    if let Some(error) = query.error {
        warn!(provider = provider.name, error = %error, "[OAUTH] Provider returned an error");
        return Err(OAuthError::Provider(error).into());
    }

    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        return Err(OAuthError::InvalidState.into());
    };

    let cookie = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(OAuthError::InvalidState)?;
    let claims = OAuthStateClaims::verify(
        &cookie,
        &state.config.auth.secret,
        provider.name,
        &returned_state,
    )?;

    let callback = redirect_uri(&request_base_url(&state.config, &headers), provider.name);
    let tokens = state
        .oauth_client
        .exchange_code(provider, &code, &callback, &claims.code_verifier)
        .await?;
    let profile = state
        .oauth_client
        .fetch_user_info(provider, &tokens.access_token)
        .await?;

    let user = {
        let mut conn = state.diesel_pool.get().await?;
        sign_in_with_profile(
            &mut conn,
            provider.name,
            &profile,
            &tokens,
            state.config.auth.bcrypt_cost,
        )
        .await?
    };

    let jar = jar.add(clear_state_cookie());
    let (jar, _) = open_session(&state, jar, &user, ActivityType::OauthSignIn, &client_ip).await?;

    info!(user_id = %user.id, provider = provider.name, "[OAUTH] User signed in");
    let dashboard = format!("{}/dashboard", state.config.public_url.trim_end_matches('/'));
    Ok((jar, Redirect::to(&dashboard)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::tests::{load, required_vars};

    #[test]
    fn test_redirect_uri() {
        assert_eq!(
            redirect_uri("https://api.example.com", "google"),
            "https://api.example.com/v1/auth/oauth/google/callback"
        );
    }

    #[test]
    fn test_state_cookie_lifetime() {
        let config = load(&required_vars()).unwrap();
        let cookie = state_cookie("signed".to_string(), &config);
        assert_eq!(cookie.name(), OAUTH_STATE_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(600)));
    }

    #[test]
    fn test_base_url_from_host_header() {
        let config = load(&required_vars()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "localhost:8080".parse().unwrap());
        assert_eq!(request_base_url(&config, &headers), "http://localhost:8080");
        assert_eq!(
            request_base_url(&config, &HeaderMap::new()),
            "http://localhost:3000"
        );
    }
}
