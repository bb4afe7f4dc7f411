// Text-backed enums stored in varchar/text columns
macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for $ty
        where
            DB: diesel::backend::Backend,
            String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
        {
            fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
                let value = String::from_sql(bytes)?;
                <$ty as std::str::FromStr>::from_str(&value).map_err(|e| e.into())
            }
        }

        impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for $ty
        where
            DB: diesel::backend::Backend,
            str: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
        {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, DB>,
            ) -> diesel::serialize::Result {
                self.as_str().to_sql(out)
            }
        }
    };
}

pub mod account;
pub mod activity_log;
pub mod client;
pub mod session;
pub mod user;
pub mod verification_token;

// Re-export common types
pub use account::{Account, AccountTokens, NewAccount};
pub use activity_log::{ActivityLog, ActivityType, NewActivityLog};
pub use client::{Client, ClientError, CreateClientRequest, NewClient};
pub use session::{Session, SessionError};
pub use user::{normalize_email, NewUser, Role, SubscriptionStatus, User, UserError, UserProfile};
pub use verification_token::{VerificationToken, VerificationTokenError};
