// Public user lookup

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    models::{User, UserError, UserProfile},
    utils::ServiceError,
};

/// GET /v1/users/{id} - Public profile, or `null` when the id is unknown or malformed
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<UserProfile>>, ServiceError> {
    let Ok(user_id) = Uuid::parse_str(&id) else {
        return Ok(Json(None));
    };

    let mut conn = state.diesel_pool.get().await?;
    match User::find_by_id(&mut conn, user_id).await {
        Ok(user) => Ok(Json(Some(user.profile()))),
        Err(UserError::NotFound) => Ok(Json(None)),
        Err(e) => Err(e.into()),
    }
}
