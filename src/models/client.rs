// Customer records owned by a user

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::clients;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = clients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = clients)]
pub struct NewClient {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email"))]
    pub email: String,

    #[validate(length(max = 255, message = "Company must be less than 255 characters"))]
    pub company: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Database error: {0}")]
    Database(diesel::result::Error),

    #[error("Client not found")]
    NotFound,

    #[error("A client with this email already exists")]
    EmailTaken,
}

impl From<diesel::result::Error> for ClientError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ClientError::NotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ClientError::EmailTaken,
            _ => ClientError::Database(error),
        }
    }
}

impl Client {
    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Vec<Self>, ClientError> {
        Ok(clients::table
            .filter(clients::user_id.eq(user_id))
            .order(clients::created_at.desc())
            .select(Client::as_select())
            .load(conn)
            .await?)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_client: NewClient,
    ) -> Result<Self, ClientError> {
        Ok(diesel::insert_into(clients::table)
            .values(&new_client)
            .returning(Client::as_returning())
            .get_result(conn)
            .await?)
    }

    /// Delete a client only if it belongs to `user_id`
    pub async fn delete_owned(
        conn: &mut AsyncPgConnection,
        client_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ClientError> {
        let deleted = diesel::delete(
            clients::table
                .filter(clients::id.eq(client_id))
                .filter(clients::user_id.eq(user_id)),
        )
        .execute(conn)
        .await?;

        if deleted == 0 {
            return Err(ClientError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_request_validation() {
        let ok = CreateClientRequest {
            name: "Acme".to_string(),
            email: "billing@acme.test".to_string(),
            company: None,
        };
        assert!(ok.validate().is_ok());

        let bad_email = CreateClientRequest {
            email: "not-an-email".to_string(),
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let no_name = CreateClientRequest {
            name: String::new(),
            ..ok
        };
        assert!(no_name.validate().is_err());
    }
}
