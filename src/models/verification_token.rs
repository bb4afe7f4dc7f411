// Email verification tokens
// (identifier, token) is the primary key; identifier is the user's email.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::verification_tokens;
use crate::utils::random_hex_token;

pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = verification_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VerificationToken {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug)]
pub enum VerificationTokenError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Invalid or expired token")]
    Invalid,
}

impl VerificationToken {
    /// Issue a fresh token for `identifier`, replacing any it already has
    pub async fn issue(
        conn: &mut AsyncPgConnection,
        identifier: &str,
    ) -> Result<Self, VerificationTokenError> {
        let token = VerificationToken {
            identifier: identifier.to_string(),
            token: random_hex_token(32),
            expires: Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS),
        };

        conn.transaction::<_, VerificationTokenError, _>(|tx| {
            let token = token.clone();
            async move {
                diesel::delete(
                    verification_tokens::table
                        .filter(verification_tokens::identifier.eq(&token.identifier)),
                )
                .execute(tx)
                .await?;

                diesel::insert_into(verification_tokens::table)
                    .values(&token)
                    .execute(tx)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await?;

        Ok(token)
    }

    /// Delete the token and report whether it was still valid.
    /// A token can be consumed once; an expired one is removed but rejected.
    pub async fn consume(
        conn: &mut AsyncPgConnection,
        identifier: &str,
        token: &str,
    ) -> Result<Self, VerificationTokenError> {
        let deleted = diesel::delete(
            verification_tokens::table
                .filter(verification_tokens::identifier.eq(identifier))
                .filter(verification_tokens::token.eq(token)),
        )
        .returning(VerificationToken::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or(VerificationTokenError::Invalid)?;

        if deleted.expires <= Utc::now() {
            return Err(VerificationTokenError::Invalid);
        }

        Ok(deleted)
    }

    pub async fn delete_expired(
        conn: &mut AsyncPgConnection,
    ) -> Result<usize, VerificationTokenError> {
        Ok(diesel::delete(
            verification_tokens::table.filter(verification_tokens::expires.lt(Utc::now())),
        )
        .execute(conn)
        .await?)
    }
}
