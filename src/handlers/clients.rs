// Client management for the signed-in user

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::{AuthenticatedUser, ClientIp},
    models::{normalize_email, ActivityType, Client, CreateClientRequest, NewClient},
    services::record_activity,
    utils::{trim_optional_field, ServiceError},
};

/// GET /v1/clients
pub async fn list_clients(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<Client>>, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(Client::list_for_user(&mut conn, auth_user.user_id).await?))
}

/// POST /v1/clients
pub async fn create_client(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    client_ip: ClientIp,
    Json(mut request): Json<CreateClientRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.name = request.name.trim().to_string();
    request.email = normalize_email(&request.email);
    request.company = trim_optional_field(request.company.as_ref());
    request.validate()?;

    let client = {
        let mut conn = state.diesel_pool.get().await?;
        Client::create(
            &mut conn,
            NewClient {
                user_id: auth_user.user_id,
                name: request.name,
                email: request.email,
                company: request.company,
            },
        )
        .await?
    };

    info!(user_id = %auth_user.user_id, client_id = %client.id, "[CLIENTS] Client created");
    record_activity(
        &state.diesel_pool,
        auth_user.user_id,
        ActivityType::CreateClient,
        client_ip.0,
    )
    .await;

    Ok((StatusCode::CREATED, Json(client)))
}

/// DELETE /v1/clients/{id}
pub async fn delete_client(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    client_ip: ClientIp,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    {
        let mut conn = state.diesel_pool.get().await?;
        Client::delete_owned(&mut conn, client_id, auth_user.user_id).await?;
    }

    info!(user_id = %auth_user.user_id, client_id = %client_id, "[CLIENTS] Client deleted");
    record_activity(
        &state.diesel_pool,
        auth_user.user_id,
        ActivityType::DeleteClient,
        client_ip.0,
    )
    .await;

    Ok(Json(json!({ "deleted": true, "id": client_id })))
}
