use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{app::AppState, middleware::AuthenticatedUser, models::ActivityLog, utils::ServiceError};

/// GET /v1/activity - Latest entries for the signed-in user, newest first
pub async fn list_activity(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ActivityLog>>, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(
        ActivityLog::recent_for_user(&mut conn, auth_user.user_id).await?,
    ))
}
