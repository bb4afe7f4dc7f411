// Application state and configuration
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    services::{
        AuthRateLimiter, BillingService, OAuthClient, OAuthProviders, StripeApi,
        VerificationNotifier, VerificationService,
    },
    utils::hash_password,
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub config: Arc<AppConfig>,
    pub stripe: Arc<dyn StripeApi>,
    pub billing_service: BillingService,
    pub verification_service: VerificationService,
    pub oauth_providers: Arc<OAuthProviders>,
    pub oauth_client: Arc<OAuthClient>,
    pub rate_limiter: Arc<AuthRateLimiter>,
    dummy_password_hash: Arc<OnceCell<Option<String>>>,
}

impl AppState {
    pub fn new(
        diesel_pool: DieselPool,
        config: Arc<AppConfig>,
        stripe: Arc<dyn StripeApi>,
        notifier: Arc<dyn VerificationNotifier>,
    ) -> Self {
        let billing_service = BillingService::new(
            diesel_pool.clone(),
            stripe.clone(),
            config.stripe.price_id.clone(),
        );
        let verification_service = VerificationService::new(diesel_pool.clone(), notifier);

        Self {
            oauth_providers: Arc::new(OAuthProviders::from_config(&config.oauth)),
            oauth_client: Arc::new(OAuthClient::new()),
            rate_limiter: Arc::new(AuthRateLimiter::new(config.auth.rate_limit_per_minute)),
            dummy_password_hash: Arc::new(OnceCell::new()),
            diesel_pool,
            config,
            stripe,
            billing_service,
            verification_service,
        }
    }

    /// Hash at the configured bcrypt cost, verified against when a login email is unknown
    /// so that path costs the same as a wrong password. Computed on first use.
    pub fn dummy_password_hash(&self) -> Option<&str> {
        self.dummy_password_hash
            .get_or_init(|| hash_password("not-a-real-password", self.config.auth.bcrypt_cost).ok())
            .as_deref()
    }
}
