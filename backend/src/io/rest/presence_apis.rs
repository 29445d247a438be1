use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use shared::{AddPresenceRequest, MessageResponse, Presence};
use tracing::info;

use super::error::ApiError;
use super::extract::{Json, Path};
use super::mappers::PresenceMapper;
use crate::AppState;

pub async fn add_presence(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<AddPresenceRequest>,
) -> Result<(StatusCode, Json<Presence>), ApiError> {
    info!("POST /presence/{} - request: {:?}", user_id, request);

    let presence = state
        .presence_service
        .add_presence(user_id, request.created_at.as_deref(), &request.period, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(PresenceMapper::to_dto(presence))))
}

pub async fn remove_presence(
    State(state): State<AppState>,
    Path(presence_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("DELETE /presence/{}", presence_id);

    state.presence_service.remove_presence(presence_id).await?;
    Ok(Json(MessageResponse {
        message: "Presence removed".to_string(),
    }))
}
