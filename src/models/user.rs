// User database model
// Identity row plus the Stripe customer/subscription state mirrored from webhooks

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::users;

/// Role of a user inside the application
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Subscription status as reported by Stripe
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
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
        }
    }

    /// Whether the subscription currently grants paid access
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Ok(SubscriptionStatus::IncompleteExpired),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "unpaid" => Ok(SubscriptionStatus::Unpaid),
            "paused" => Ok(SubscriptionStatus::Paused),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

text_enum_sql!(Role);
text_enum_sql!(SubscriptionStatus);

/// User database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_status: Option<SubscriptionStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// Profile returned to API clients; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub role: Role,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_status: Option<SubscriptionStatus>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            image: user.image.clone(),
            role: user.role,
            stripe_customer_id: user.stripe_customer_id.clone(),
            stripe_subscription_id: user.stripe_subscription_id.clone(),
            stripe_subscription_status: user.stripe_subscription_status,
            created_at: user.created_at,
        }
    }
}

/// Errors for user operations
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Email already registered")]
    EmailTaken,
}

/// Emails are stored lowercased so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Find user by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        users::table
            .filter(users::id.eq(user_id))
            .select(User::as_select())
            .first(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find user by email (case-insensitive)
    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email: &str,
    ) -> Result<Self, UserError> {
        users::table
            .filter(users::email.eq(normalize_email(email)))
            .select(User::as_select())
            .first(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Create a new user
    pub async fn create(
        conn: &mut AsyncPgConnection,
        mut new_user: NewUser,
    ) -> Result<Self, UserError> {
        new_user.email = normalize_email(&new_user.email);

        diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => UserError::EmailTaken,
                _ => UserError::Database(e),
            })
    }

    /// Store a Stripe customer id unless one is already present.
    ///
    /// Returns the id now stored on the row: the new one, or the one a concurrent
    /// request persisted first.
    pub async fn set_stripe_customer_id_if_absent(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<Option<String>, UserError> {
        let updated = diesel::update(
            users::table
                .filter(users::id.eq(user_id))
                .filter(users::stripe_customer_id.is_null()),
        )
        .set(users::stripe_customer_id.eq(customer_id))
        .returning(users::stripe_customer_id)
        .get_result::<Option<String>>(conn)
        .await
        .optional()?;

        match updated {
            Some(stored) => Ok(stored),
            None => Ok(Self::find_by_id(conn, user_id).await?.stripe_customer_id),
        }
    }

    /// Overwrite the subscription columns of exactly one user.
    /// Returns the number of rows touched (0 when the user does not exist).
    pub async fn update_subscription(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        subscription_id: Option<&str>,
        status: Option<SubscriptionStatus>,
    ) -> Result<usize, UserError> {
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::stripe_subscription_id.eq(subscription_id),
                users::stripe_subscription_status.eq(status),
            ))
            .execute(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Mark the address as verified now
    pub async fn mark_email_verified(
        conn: &mut AsyncPgConnection,
        email: &str,
    ) -> Result<Self, UserError> {
        diesel::update(users::table.filter(users::email.eq(normalize_email(email))))
            .set(users::email_verified.eq(Some(Utc::now())))
            .returning(User::as_returning())
            .get_result(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Whether the mirrored subscription currently grants paid access
    pub fn has_active_subscription(&self) -> bool {
        self.stripe_subscription_status
            .map(|s| s.grants_access())
            .unwrap_or(false)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}
