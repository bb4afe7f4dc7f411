// Server-side session rows
// The bearer value handed to the client is never stored; only its SHA-256 hex digest is.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::schema::sessions;
use crate::utils::random_hex_token;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = sessions)]
#[diesel(primary_key(session_token))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub session_token: String,
    pub user_id: Uuid,
    pub expires: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub session_token: String,
    pub user_id: Uuid,
    pub expires: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,
}

/// 32 random bytes, hex encoded
pub fn generate_session_token() -> String {
    random_hex_token(32)
}

/// Digest stored in `sessions.session_token`
pub fn hash_session_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl Session {
    /// Persist a new session and return it together with the raw bearer token.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        max_age: Duration,
    ) -> Result<(Self, String), SessionError> {
        let token = generate_session_token();
        let new_session = NewSession {
            session_token: hash_session_token(&token),
            user_id,
            expires: Utc::now() + max_age,
        };

        let session = diesel::insert_into(sessions::table)
            .values(&new_session)
            .returning(Session::as_returning())
            .get_result(conn)
            .await?;

        Ok((session, token))
    }

    /// Resolve a raw bearer token. Expired rows are removed and reported as `Expired`.
    pub async fn find_valid(
        conn: &mut AsyncPgConnection,
        token: &str,
    ) -> Result<Self, SessionError> {
        let hashed = hash_session_token(token);

        let session = sessions::table
            .filter(sessions::session_token.eq(&hashed))
            .select(Session::as_select())
            .first(conn)
            .await
            .optional()?
            .ok_or(SessionError::NotFound)?;

        if session.is_expired() {
            diesel::delete(sessions::table.filter(sessions::session_token.eq(&hashed)))
                .execute(conn)
                .await?;
            return Err(SessionError::Expired);
        }

        Ok(session)
    }

    /// Delete the session identified by a raw bearer token
    pub async fn delete_by_token(
        conn: &mut AsyncPgConnection,
        token: &str,
    ) -> Result<usize, SessionError> {
        let hashed = hash_session_token(token);
        Ok(
            diesel::delete(sessions::table.filter(sessions::session_token.eq(hashed)))
                .execute(conn)
                .await?,
        )
    }

    pub async fn delete_expired(conn: &mut AsyncPgConnection) -> Result<usize, SessionError> {
        Ok(
            diesel::delete(sessions::table.filter(sessions::expires.lt(Utc::now())))
                .execute(conn)
                .await?,
        )
    }

    pub fn is_expired(&self) -> bool {
        self.expires <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_and_differs_from_token() {
        let token = "abc";
        assert_eq!(hash_session_token(token), hash_session_token(token));
        assert_eq!(
            hash_session_token(token),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_session_token(token), token);
    }

    #[test]
    fn test_is_expired() {
        let mut session = Session {
            session_token: "x".to_string(),
            user_id: Uuid::new_v4(),
            expires: Utc::now() + Duration::hours(1),
            created_at: Utc::now(),
        };
        assert!(!session.is_expired());

        session.expires = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
    }
}
