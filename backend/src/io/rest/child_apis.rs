//! # REST API for Child Management
//!
//! Listing, filtering, importing, editing and deleting children, plus the
//! bulk resets used between seasons.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use shared::{
    AgeFilterQuery, ChildPageResponse, ChildPointsResponse, ChildSummary, ChildWithPoints, CreateChildRequest,
    DeleteChildrenRequest, DeleteChildrenResponse, PointsQuery, ResetResponse, UpdateChildRequest,
};
use tracing::info;

use super::error::ApiError;
use super::extract::{Json, Path, Query};
use super::mappers::{ChildMapper, PointMapper};
use crate::AppState;

pub async fn list_children(State(state): State<AppState>) -> Result<Json<Vec<ChildWithPoints>>, ApiError> {
    info!("GET /children");

    let children = state.child_service.list_children().await?;
    Ok(Json(children.into_iter().map(ChildMapper::to_with_points_dto).collect()))
}

pub async fn filter_by_age(
    State(state): State<AppState>,
    Query(query): Query<AgeFilterQuery>,
) -> Result<Json<ChildPageResponse>, ApiError> {
    info!("GET /children/filterByAge - query: {:?}", query);

    let page = state
        .child_service
        .filter_by_age(ChildMapper::to_age_filter(query), Utc::now())
        .await?;
    Ok(Json(ChildMapper::to_page_dto(page)))
}

pub async fn get_child(State(state): State<AppState>, Path(child_id): Path<i64>) -> Result<Json<ChildSummary>, ApiError> {
    info!("GET /children/{}", child_id);

    let overview = state.child_service.get_child(child_id, Utc::now()).await?;
    Ok(Json(ChildMapper::to_summary_dto(overview)))
}

pub async fn get_points(
    State(state): State<AppState>,
    Path(child_id): Path<i64>,
    Query(query): Query<PointsQuery>,
) -> Result<Json<ChildPointsResponse>, ApiError> {
    info!("GET /children/{}/points - show more: {:?}", child_id, query.show_more);

    let points = state.child_service.get_points(child_id, query.show_more).await?;
    Ok(Json(PointMapper::to_child_points_dto(child_id, points)))
}

pub async fn get_all_points(
    State(state): State<AppState>,
    Path(child_id): Path<i64>,
) -> Result<Json<ChildPointsResponse>, ApiError> {
    info!("GET /children/{}/points/all", child_id);

    let points = state.child_service.get_all_points(child_id).await?;
    Ok(Json(PointMapper::to_child_points_dto(child_id, points)))
}

/// Create a list of children, all or none
pub async fn create_children(
    State(state): State<AppState>,
    Json(requests): Json<Vec<CreateChildRequest>>,
) -> Result<(StatusCode, Json<Vec<ChildWithPoints>>), ApiError> {
    info!("POST /children - {} children", requests.len());

    let inputs = requests.into_iter().map(ChildMapper::to_input).collect();
    let created = state.child_service.create_children(inputs, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(ChildMapper::to_with_points_dto).collect()),
    ))
}

/// Best-effort import: 201 when every child was created, 400 with the errors otherwise
pub async fn create_children_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<CreateChildRequest>>,
) -> Result<Response, ApiError> {
    info!("POST /children/batch - {} children", requests.len());

    let inputs = requests.into_iter().map(ChildMapper::to_input).collect();
    let import = state.child_service.create_many_children(inputs, Utc::now()).await?;
    let status = if import.errors.is_empty() {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(ChildMapper::to_batch_dto(import))).into_response())
}

pub async fn update_child(
    State(state): State<AppState>,
    Path(child_id): Path<i64>,
    Json(request): Json<UpdateChildRequest>,
) -> Result<Json<ChildWithPoints>, ApiError> {
    info!("PUT /children/{} - request: {:?}", child_id, request);

    let (input, user_id) = ChildMapper::to_update_input(request);
    let updated = state
        .child_service
        .update_child(child_id, input, user_id, Utc::now())
        .await?;
    Ok(Json(ChildMapper::to_with_points_dto(updated)))
}

pub async fn delete_children(
    State(state): State<AppState>,
    Json(request): Json<DeleteChildrenRequest>,
) -> Result<Json<DeleteChildrenResponse>, ApiError> {
    info!("DELETE /delete - ids: {:?}", request.ids);

    let deleted = state.child_service.delete_children(&request.ids).await?;
    Ok(Json(DeleteChildrenResponse {
        message: format!("{} children deleted", deleted),
        deleted,
    }))
}

pub async fn reset_points(State(state): State<AppState>) -> Result<Json<ResetResponse>, ApiError> {
    info!("DELETE /resetPoints");

    let count = state.child_service.reset_all_points().await?;
    Ok(Json(ResetResponse {
        message: "All points were deleted".to_string(),
        count,
    }))
}

pub async fn reset_children(State(state): State<AppState>) -> Result<Json<ResetResponse>, ApiError> {
    info!("DELETE /resetChildren");

    let count = state.child_service.reset_all_children().await?;
    Ok(Json(ResetResponse {
        message: "All children were deleted".to_string(),
        count,
    }))
}
