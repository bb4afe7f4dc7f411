// OAuth sign-in (Google, Discord)
// Authorization code flow with PKCE. The state, verifier and provider travel in a
// short-lived HS256-signed cookie, so no server-side state is kept between the
// redirect and the callback.

use std::collections::HashMap;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::app_config::OAuthConfig;
use crate::models::{
    normalize_email, Account, AccountTokens, NewAccount, NewUser, Role, User, UserError,
};
use crate::utils::{hash_random_password, AuthError};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const OAUTH_STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Unknown or disabled OAuth provider")]
    UnknownProvider,

    #[error("Missing or invalid OAuth state")]
    InvalidState,

    #[error("Provider request failed: {0}")]
    Provider(String),

    #[error("Provider profile is missing {0}")]
    Profile(String),

    #[error("An account with this email already exists; sign in with your original method")]
    AccountNotLinked,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<diesel::result::Error> for OAuthError {
    fn from(error: diesel::result::Error) -> Self {
        OAuthError::Database(error.to_string())
    }
}

impl From<UserError> for OAuthError {
    fn from(error: UserError) -> Self {
        OAuthError::Database(error.to_string())
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(error: reqwest::Error) -> Self {
        OAuthError::Provider(error.to_string())
    }
}

impl From<OAuthError> for AuthError {
    fn from(error: OAuthError) -> Self {
        match error {
            OAuthError::UnknownProvider => AuthError::UnknownProvider,
            OAuthError::AccountNotLinked => AuthError::AccountNotLinked,
            OAuthError::Database(msg) => AuthError::DatabaseError(msg),
            OAuthError::Internal(_) => AuthError::InternalError,
            other => AuthError::OAuth(other.to_string()),
        }
    }
}

// =============================================================================
// PROVIDERS
// =============================================================================

/// Profile fields extracted from a provider's user info endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthUserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub name: &'static str,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub user_info_url: String,
    pub scopes: Vec<&'static str>,
    pub map_user_info: fn(&Value) -> Result<OAuthUserInfo, String>,
}

impl OAuthProvider {
    pub fn google(client_id: &str, client_secret: &str) -> Self {
        Self {
            name: "google",
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            user_info_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            scopes: vec!["openid", "email", "profile"],
            map_user_info: |v| {
                Ok(OAuthUserInfo {
                    id: v["sub"].as_str().ok_or("sub")?.to_string(),
                    email: v["email"].as_str().ok_or("email")?.to_string(),
                    name: v["name"].as_str().map(String::from),
                    image: v["picture"].as_str().map(String::from),
                    email_verified: v["email_verified"].as_bool().unwrap_or(false),
                })
            },
        }
    }

    pub fn discord(client_id: &str, client_secret: &str) -> Self {
        Self {
            name: "discord",
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_url: "https://discord.com/api/oauth2/authorize".to_string(),
            token_url: "https://discord.com/api/oauth2/token".to_string(),
            user_info_url: "https://discord.com/api/users/@me".to_string(),
            scopes: vec!["identify", "email"],
            map_user_info: |v| {
                let id = v["id"].as_str().ok_or("id")?;
                Ok(OAuthUserInfo {
                    id: id.to_string(),
                    email: v["email"].as_str().ok_or("email")?.to_string(),
                    name: v["global_name"]
                        .as_str()
                        .or_else(|| v["username"].as_str())
                        .map(String::from),
                    image: v["avatar"].as_str().map(|avatar| {
                        format!("https://cdn.discordapp.com/avatars/{}/{}.png", id, avatar)
                    }),
                    email_verified: v["verified"].as_bool().unwrap_or(false),
                })
            },
        }
    }

    /// Provider authorization URL with PKCE (S256)
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> Result<String, OAuthError> {
        let mut url =
            url::Url::parse(&self.auth_url).map_err(|e| OAuthError::Internal(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");
        Ok(url.to_string())
    }
}

/// Providers enabled by configuration, keyed by name
#[derive(Debug, Clone, Default)]
pub struct OAuthProviders {
    providers: HashMap<&'static str, OAuthProvider>,
}

impl OAuthProviders {
    pub fn from_config(config: &OAuthConfig) -> Self {
        let mut providers = HashMap::new();
        if let Some(google) = &config.google {
            let provider = OAuthProvider::google(&google.client_id, &google.client_secret);
            providers.insert(provider.name, provider);
        }
        if let Some(discord) = &config.discord {
            let provider = OAuthProvider::discord(&discord.client_id, &discord.client_secret);
            providers.insert(provider.name, provider);
        }
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Result<&OAuthProvider, OAuthError> {
        self.providers.get(name).ok_or(OAuthError::UnknownProvider)
    }

    pub fn enabled(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// =============================================================================
// STATE COOKIE & PKCE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthStateClaims {
    pub provider: String,
    pub state: String,
    pub code_verifier: String,
    pub exp: i64,
}

fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// (verifier, S256 challenge)
pub fn generate_pkce() -> (String, String) {
    let verifier = random_string(64);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

impl OAuthStateClaims {
    pub fn new(provider: &str) -> Self {
        let (code_verifier, _) = generate_pkce();
        Self {
            provider: provider.to_string(),
            state: random_string(32),
            code_verifier,
            exp: Utc::now().timestamp() + OAUTH_STATE_TTL_SECS,
        }
    }

    pub fn code_challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.code_verifier.as_bytes()))
    }

    pub fn sign(&self, secret: &str) -> Result<String, OAuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| OAuthError::Internal(e.to_string()))
    }

    /// Decode the cookie and check it was issued for this provider and state
    pub fn verify(
        cookie: &str,
        secret: &str,
        provider: &str,
        state: &str,
    ) -> Result<Self, OAuthError> {
        let claims = decode::<Self>(
            cookie,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| OAuthError::InvalidState)?
        .claims;

        if claims.provider != provider || claims.state != state {
            return Err(OAuthError::InvalidState);
        }
        Ok(claims)
    }
}

// =============================================================================
// CODE EXCHANGE
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuthTokens {
    pub fn to_account_tokens(&self) -> AccountTokens {
        AccountTokens {
            refresh_token: self.refresh_token.clone(),
            access_token: Some(self.access_token.clone()),
            expires_at: self
                .expires_in
                .and_then(|secs| i32::try_from(Utc::now().timestamp() + secs).ok()),
            token_type: self.token_type.clone(),
            scope: self.scope.clone(),
            id_token: self.id_token.clone(),
        }
    }
}

pub struct OAuthClient {
    http_client: reqwest::Client,
}

impl Default for OAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthClient {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { http_client }
    }

    #[instrument(skip(self, provider, code, code_verifier), fields(provider = provider.name))]
    pub async fn exchange_code(
        &self,
        provider: &OAuthProvider,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<OAuthTokens, OAuthError> {
        let response = self
            .http_client
            .post(&provider.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Provider(format!(
                "token exchange returned {}: {}",
                status, body
            )));
        }

        response
            .json::<OAuthTokens>()
            .await
            .map_err(|e| OAuthError::Provider(format!("invalid token response: {}", e)))
    }

    #[instrument(skip(self, provider, access_token), fields(provider = provider.name))]
    pub async fn fetch_user_info(
        &self,
        provider: &OAuthProvider,
        access_token: &str,
    ) -> Result<OAuthUserInfo, OAuthError> {
        let response = self
            .http_client
            .get(&provider.user_info_url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Provider(format!(
                "user info returned {}",
                response.status()
            )));
        }

        let profile: Value = response.json().await?;
        (provider.map_user_info)(&profile).map_err(OAuthError::Profile)
    }
}

// =============================================================================
// ACCOUNT LINKING
// =============================================================================

/// Resolve a provider profile to a local user.
///
/// - known `(provider, account id)`: refresh the stored tokens and return its user
/// - otherwise a user with the same email: link a new account to it, but only when
///   the provider has verified that email
/// - otherwise: create the user and the account together
#[instrument(skip(conn, info, tokens), fields(provider_account_id = %info.id))]
pub async fn sign_in_with_profile(
    conn: &mut AsyncPgConnection,
    provider: &str,
    info: &OAuthUserInfo,
    tokens: &OAuthTokens,
    bcrypt_cost: u32,
) -> Result<User, OAuthError> {
    let account_tokens = tokens.to_account_tokens();

    if let Some(account) = Account::find_by_provider(conn, provider, &info.id).await? {
        Account::update_tokens(conn, account.id, &account_tokens).await?;
        debug!(user_id = %account.user_id, "[OAUTH] Existing account signed in");
        return Ok(User::find_by_id(conn, account.user_id).await?);
    }

    let new_account = |user_id| NewAccount {
        user_id,
        account_type: "oauth".to_string(),
        provider: provider.to_string(),
        provider_account_id: info.id.clone(),
        refresh_token: account_tokens.refresh_token.clone(),
        access_token: account_tokens.access_token.clone(),
        expires_at: account_tokens.expires_at,
        token_type: account_tokens.token_type.clone(),
        scope: account_tokens.scope.clone(),
        id_token: account_tokens.id_token.clone(),
    };

    match User::find_by_email(conn, &info.email).await {
        Ok(user) if !info.email_verified => {
            warn!(user_id = %user.id, "[OAUTH] Refusing to link unverified provider email");
            return Err(OAuthError::AccountNotLinked);
        },
        Ok(user) => {
            Account::create(conn, new_account(user.id)).await?;
            info!(user_id = %user.id, "[OAUTH] Linked provider account to existing user");
            return Ok(user);
        },
        Err(UserError::NotFound) => {},
        Err(e) => return Err(e.into()),
    }

    let password_hash = tokio::task::spawn_blocking(move || hash_random_password(bcrypt_cost))
        .await
        .map_err(|e| OAuthError::Internal(e.to_string()))?
        .map_err(|e| OAuthError::Internal(e.to_string()))?;

    let new_user = NewUser {
        name: info.name.clone(),
        email: normalize_email(&info.email),
        email_verified: info.email_verified.then(Utc::now),
        image: info.image.clone(),
        password_hash,
        role: Role::Member,
    };

    let user = conn
        .transaction::<_, OAuthError, _>(|tx| {
            async move {
                let user = User::create(tx, new_user).await?;
                Account::create(tx, new_account(user.id)).await?;
                Ok(user)
            }
            .scope_boxed()
        })
        .await?;

    info!(user_id = %user.id, "[OAUTH] Created user from provider profile");
    Ok(user)
}
