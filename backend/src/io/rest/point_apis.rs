//! # REST API for the Point Ledger
//!
//! Awarding a point to a child and retracting a child's latest point.

use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use shared::{AwardPointResponse, MessageResponse};
use tracing::info;

use super::error::ApiError;
use super::extract::{Json, Path};
use super::mappers::PointMapper;
use crate::AppState;

/// Award one point to a child on behalf of a user
pub async fn add_point(
    State(state): State<AppState>,
    Path((child_id, user_id)): Path<(i64, i64)>,
) -> Result<(StatusCode, Json<AwardPointResponse>), ApiError> {
    info!("POST /addPoint/{}/{}", child_id, user_id);

    let awarded = state.ledger.try_award_point(child_id, user_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(PointMapper::to_award_dto(awarded))))
}

/// Retract the most recent point of a child
pub async fn delete_point(
    State(state): State<AppState>,
    Path(child_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("DELETE /deletePoint/{}", child_id);

    state.ledger.try_retract_last_point(child_id, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: "Point removed".to_string(),
    }))
}
