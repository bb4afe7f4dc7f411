// Append-only audit trail of user actions

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::activity_logs;

pub const ACTIVITY_PAGE_SIZE: i64 = 50;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    SignUp,
    SignIn,
    SignOut,
    OauthSignIn,
    EmailVerified,
    CreateClient,
    DeleteClient,
    CheckoutStarted,
    BillingPortalOpened,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::SignUp => "SIGN_UP",
            ActivityType::SignIn => "SIGN_IN",
            ActivityType::SignOut => "SIGN_OUT",
            ActivityType::OauthSignIn => "OAUTH_SIGN_IN",
            ActivityType::EmailVerified => "EMAIL_VERIFIED",
            ActivityType::CreateClient => "CREATE_CLIENT",
            ActivityType::DeleteClient => "DELETE_CLIENT",
            ActivityType::CheckoutStarted => "CHECKOUT_STARTED",
            ActivityType::BillingPortalOpened => "BILLING_PORTAL_OPENED",
        }
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIGN_UP" => Ok(ActivityType::SignUp),
            "SIGN_IN" => Ok(ActivityType::SignIn),
            "SIGN_OUT" => Ok(ActivityType::SignOut),
            "OAUTH_SIGN_IN" => Ok(ActivityType::OauthSignIn),
            "EMAIL_VERIFIED" => Ok(ActivityType::EmailVerified),
            "CREATE_CLIENT" => Ok(ActivityType::CreateClient),
            "DELETE_CLIENT" => Ok(ActivityType::DeleteClient),
            "CHECKOUT_STARTED" => Ok(ActivityType::CheckoutStarted),
            "BILLING_PORTAL_OPENED" => Ok(ActivityType::BillingPortalOpened),
            _ => Err(format!("Invalid activity type: {}", s)),
        }
    }
}

text_enum_sql!(ActivityType);

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = activity_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: ActivityType,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = activity_logs)]
pub struct NewActivityLog {
    pub user_id: Uuid,
    pub action: ActivityType,
    pub ip_address: Option<String>,
}

impl ActivityLog {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        entry: NewActivityLog,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(activity_logs::table)
            .values(&entry)
            .returning(ActivityLog::as_returning())
            .get_result(conn)
            .await
    }

    /// Latest entries for a user, newest first
    pub async fn recent_for_user(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        activity_logs::table
            .filter(activity_logs::user_id.eq(user_id))
            .order(activity_logs::timestamp.desc())
            .limit(ACTIVITY_PAGE_SIZE)
            .select(ActivityLog::as_select())
            .load(conn)
            .await
    }
}
