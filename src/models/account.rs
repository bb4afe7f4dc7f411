// OAuth account linkage: one row per (provider, provider_account_id)

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::accounts;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    #[serde(skip_serializing)]
    pub id_token: Option<String>,
    pub session_state: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

/// Token fields refreshed on every successful OAuth sign-in
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = accounts)]
#[diesel(treat_none_as_null = true)]
pub struct AccountTokens {
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

impl Account {
    pub async fn find_by_provider(
        conn: &mut AsyncPgConnection,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        accounts::table
            .filter(accounts::provider.eq(provider))
            .filter(accounts::provider_account_id.eq(provider_account_id))
            .select(Account::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_account: NewAccount,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(accounts::table)
            .values(&new_account)
            .returning(Account::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn update_tokens(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
        tokens: &AccountTokens,
    ) -> Result<usize, diesel::result::Error> {
        diesel::update(accounts::table.filter(accounts::id.eq(account_id)))
            .set(tokens)
            .execute(conn)
            .await
    }
}
