// Authenticated request identity, resolved from the session row

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// Authenticated user information attached to the request by `auth_middleware`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    /// Raw bearer value the request authenticated with; needed to end the session
    #[serde(skip_serializing)]
    pub session_token: String,
}
