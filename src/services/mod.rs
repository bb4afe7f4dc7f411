// Services module
// Business logic layer for the application

pub mod activity;
pub mod background_tasks;
pub mod billing;
pub mod oauth;
pub mod rate_limit;
pub mod stripe;
pub mod verification;
pub mod webhook;

// Re-export commonly used services
pub use activity::record_activity;
pub use background_tasks::{initialize_background_tasks, BackgroundTaskManager, PurgeStats};
pub use billing::{BillingError, BillingService, PriceSummary, ProductSummary, SubscriptionSummary};
pub use oauth::{OAuthClient, OAuthError, OAuthProviders, OAuthStateClaims};
pub use rate_limit::{AuthRateLimiter, RateLimitResult};
pub use stripe::{StripeApi, StripeClient, StripeError};
pub use verification::{LogNotifier, VerificationNotifier, VerificationService};
pub use webhook::{WebhookError, WebhookOutcome};
