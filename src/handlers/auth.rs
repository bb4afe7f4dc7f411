// Authentication handlers: credentials sign-up/sign-in, sessions, email verification

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::UserAgent,
    TypedHeader,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    app::AppState,
    app_config::AppConfig,
    middleware::{AuthenticatedUser, ClientIp, SESSION_COOKIE},
    models::{normalize_email, ActivityType, NewUser, Role, Session, User, UserError, UserProfile},
    services::record_activity,
    utils::{
        hash_password, log_auth_failure, trim_optional_field, validate_credentials,
        verify_password, AuthError,
    },
};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyEmailRequest {
    pub identifier: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> AuthResponse<T> {
    pub fn ok(data: T, message: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Bearer value for non-browser clients; browsers use the cookie
    pub session_token: String,
    pub expires: DateTime<Utc>,
    pub user: UserProfile,
}

// =============================================================================
// COOKIES
// =============================================================================

pub fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(config.auth.session_max_age_days as i64))
        .build()
}

fn delete_session_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(-1))
        .build()
}

/// Open a session for `user`, record `action` and return the cookie jar and payload
pub async fn open_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
    action: ActivityType,
    client_ip: &ClientIp,
) -> Result<(CookieJar, SessionResponse), AuthError> {
    let (session, token) = {
        let mut conn = state.diesel_pool.get().await?;
        Session::create(&mut conn, user.id, state.config.session_max_age()).await?
    };

    record_activity(&state.diesel_pool, user.id, action, client_ip.0.clone()).await;

    let jar = jar.add(session_cookie(token.clone(), &state.config));
    Ok((
        jar,
        SessionResponse {
            session_token: token,
            expires: session.expires,
            user: user.profile(),
        },
    ))
}

// =============================================================================
// AUTHENTICATION HANDLERS
// =============================================================================

/// POST /auth/register - Create a credentials account and sign in
pub async fn register(
    State(state): State<AppState>,
    client_ip: ClientIp,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_credentials(&req.email, &req.password).map_err(AuthError::ValidationError)?;

    let email = normalize_email(&req.email);
    let name = trim_optional_field(req.name.as_ref());
    if name.as_ref().is_some_and(|n| n.chars().count() > 100) {
        return Err(AuthError::ValidationError(
            "Name must be less than 100 characters".to_string(),
        ));
    }

    {
        let mut conn = state.diesel_pool.get().await?;
        match User::find_by_email(&mut conn, &email).await {
            Ok(_) => return Err(AuthError::EmailTaken),
            Err(UserError::NotFound) => {},
            Err(e) => return Err(e.into()),
        }
    }

    let cost = state.config.auth.bcrypt_cost;
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|_| AuthError::InternalError)??;

    let user = {
        let mut conn = state.diesel_pool.get().await?;
        User::create(
            &mut conn,
            NewUser {
                name,
                email,
                email_verified: None,
                image: None,
                password_hash,
                role: Role::Member,
            },
        )
        .await?
    };

    info!(user_id = %user.id, "[AUTH] User registered");
    let (jar, session) = open_session(&state, jar, &user, ActivityType::SignUp, &client_ip).await?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse::ok(session, "Registration successful")),
    ))
}

/// POST /auth/login - Authenticate with email and password
pub async fn login(
    State(state): State<AppState>,
    client_ip: ClientIp,
    user_agent: Option<TypedHeader<UserAgent>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_credentials(&req.email, &req.password).map_err(AuthError::ValidationError)?;

    let email = normalize_email(&req.email);
    let user_agent = user_agent.map(|TypedHeader(ua)| ua.to_string());

    let lookup = {
        let mut conn = state.diesel_pool.get().await?;
        User::find_by_email(&mut conn, &email).await
    };

    let user = match lookup {
        Ok(user) => user,
        Err(UserError::NotFound) => {
            let password = req.password;
            let blocking_state = state.clone();
            let _ = tokio::task::spawn_blocking(move || {
                blocking_state
                    .dummy_password_hash()
                    .map(|hash| verify_password(&password, hash))
            })
            .await;

            let err = AuthError::InvalidCredentials;
            log_auth_failure(&email, client_ip.as_key(), &err, user_agent.as_deref());
            return Err(err);
        },
        Err(e) => return Err(e.into()),
    };

    let password = req.password;
    let stored_hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|_| AuthError::InternalError)?
        .unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "[AUTH] Stored password hash unusable");
            false
        });

    if !valid {
        let err = AuthError::InvalidCredentials;
        log_auth_failure(&email, client_ip.as_key(), &err, user_agent.as_deref());
        return Err(err);
    }

    info!(user_id = %user.id, "[AUTH] User signed in");
    let (jar, session) = open_session(&state, jar, &user, ActivityType::SignIn, &client_ip).await?;

    Ok((jar, Json(AuthResponse::ok(session, "Login successful"))))
}

/// POST /auth/logout - End the current session
pub async fn logout(
    State(state): State<AppState>,
    client_ip: ClientIp,
    auth_user: AuthenticatedUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    {
        let mut conn = state.diesel_pool.get().await?;
        Session::delete_by_token(&mut conn, &auth_user.session_token).await?;
    }

    record_activity(
        &state.diesel_pool,
        auth_user.user_id,
        ActivityType::SignOut,
        client_ip.0,
    )
    .await;

    let jar = jar.add(delete_session_cookie(&state.config));
    Ok((jar, Json(AuthResponse::ok((), "Logged out"))))
}

/// GET /auth/me - Profile of the signed-in user
pub async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, AuthError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, auth_user.user_id).await?;
    Ok(Json(AuthResponse::ok(user.profile(), "Current user")))
}

/// POST /auth/verification - Send a verification link to the signed-in user's email
pub async fn request_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, AuthError> {
    let user = {
        let mut conn = state.diesel_pool.get().await?;
        User::find_by_id(&mut conn, auth_user.user_id).await?
    };

    if user.email_verified.is_some() {
        return Ok((
            StatusCode::OK,
            Json(AuthResponse::ok((), "Email already verified")),
        ));
    }

    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    let base_url = state.config.base_url(host);
    state.verification_service.request(&user, &base_url).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AuthResponse::ok((), "Verification email sent")),
    ))
}

/// POST /auth/verify-email - Consume a verification token
pub async fn verify_email(
    State(state): State<AppState>,
    client_ip: ClientIp,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state
        .verification_service
        .verify(&normalize_email(&req.identifier), req.token.trim())
        .await?;

    record_activity(
        &state.diesel_pool,
        user.id,
        ActivityType::EmailVerified,
        client_ip.0,
    )
    .await;

    Ok(Json(AuthResponse::ok(user.profile(), "Email verified")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::tests::{load, required_vars};

    #[test]
    fn test_session_cookie_attributes() {
        let config = load(&required_vars()).unwrap();
        let cookie = session_cookie("tok".to_string(), &config);

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));
        // Development is served over plain http
        assert_ne!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_delete_cookie_expires_immediately() {
        let config = load(&required_vars()).unwrap();
        let cookie = delete_session_cookie(&config);
        assert_eq!(cookie.value(), "");
        assert!(cookie.max_age().unwrap().is_negative());
    }

    #[test]
    fn test_login_request_defaults_missing_fields() {
        let req: LoginRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(
            validate_credentials(&req.email, &req.password),
            Err("Email is required".to_string())
        );
    }
}
