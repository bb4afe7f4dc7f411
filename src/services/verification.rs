// Email verification service
// Issues single-use tokens and hands them to a notifier for delivery

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::db::DieselPool;
use crate::models::{User, VerificationToken};
use crate::utils::AuthError;

/// Delivers verification tokens to the user
#[async_trait]
pub trait VerificationNotifier: Send + Sync {
    async fn send_verification(&self, token: &VerificationToken, verify_url: &str);
}

/// Writes the verification link to the log. Used until a mail transport is configured.
pub struct LogNotifier;

#[async_trait]
impl VerificationNotifier for LogNotifier {
    async fn send_verification(&self, token: &VerificationToken, verify_url: &str) {
        info!(
            identifier = %token.identifier,
            expires = %token.expires,
            url = %verify_url,
            "[VERIFICATION] Verification link issued"
        );
    }
}

#[derive(Clone)]
pub struct VerificationService {
    pool: DieselPool,
    notifier: Arc<dyn VerificationNotifier>,
}

impl VerificationService {
    pub fn new(pool: DieselPool, notifier: Arc<dyn VerificationNotifier>) -> Self {
        Self { pool, notifier }
    }

    /// Issue a token for the user's email and notify them
    #[instrument(skip(self, user, base_url), fields(user_id = %user.id))]
    pub async fn request(&self, user: &User, base_url: &str) -> Result<(), AuthError> {
        let mut conn = self.pool.get().await?;
        let token = VerificationToken::issue(&mut conn, &user.email).await?;
        drop(conn);

        let url = verify_url(base_url, &token);
        self.notifier.send_verification(&token, &url).await;
        Ok(())
    }

    /// Consume a token and mark the address verified
    #[instrument(skip(self, token))]
    pub async fn verify(&self, identifier: &str, token: &str) -> Result<User, AuthError> {
        let mut conn = self.pool.get().await?;
        let consumed = VerificationToken::consume(&mut conn, identifier, token).await?;
        let user = User::mark_email_verified(&mut conn, &consumed.identifier).await?;
        info!(user_id = %user.id, "[VERIFICATION] Email verified");
        Ok(user)
    }
}

pub fn verify_url(base_url: &str, token: &VerificationToken) -> String {
    let mut url = match url::Url::parse(&format!("{}/verify-email", base_url)) {
        Ok(url) => url,
        Err(_) => return format!("{}/verify-email", base_url),
    };
    url.query_pairs_mut()
        .append_pair("identifier", &token.identifier)
        .append_pair("token", &token.token);
    url.to_string()
}
