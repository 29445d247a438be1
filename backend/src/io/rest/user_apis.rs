//! # REST API for Users
//!
//! Registration and login are public; everything else sits behind the
//! bearer token middleware.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
};
use chrono::Utc;
use shared::{
    AvatarRefreshResponse, LoginRequest, LoginResponse, MessageResponse, RegisterRequest, UpdateUserRequest,
    User as SharedUser, UserListQuery, UserListResponse,
};
use tracing::info;

use super::error::ApiError;
use super::extract::{Json, Path, Query};
use super::mappers::UserMapper;
use crate::AppState;

/// Multipart field carrying the avatar image
const AVATAR_FIELD: &str = "avatar";

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SharedUser>), ApiError> {
    info!("POST /register - username: {}", request.username);

    let user = state
        .user_service
        .register(&request.username, &request.password, request.level)
        .await?;
    Ok((StatusCode::CREATED, Json(UserMapper::to_dto(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    info!("POST /login - username: {}", request.username);

    let token = state
        .user_service
        .login(&request.username, &request.password, Utc::now())
        .await?;
    Ok(Json(LoginResponse { token }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    info!("GET /users - query: {:?}", query);

    let listing = state.user_service.list_users(UserMapper::to_query(query)).await?;
    Ok(Json(UserMapper::to_listing_dto(listing)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<SharedUser>, ApiError> {
    info!("PUT /users/{} - username: {}", user_id, request.username);

    let user = state
        .user_service
        .update_user(user_id, &request.username, request.password.as_deref(), request.level)
        .await?;
    Ok(Json(UserMapper::to_dto(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("DELETE /users/{}", user_id);

    state.user_service.delete_user(user_id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted".to_string(),
    }))
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SharedUser>, ApiError> {
    info!("POST /users/{}/avatar", user_id);

    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let user = state
            .user_service
            .upload_avatar(user_id, content_type.as_deref(), &data)
            .await?;
        return Ok(Json(UserMapper::to_dto(user)));
    }

    Err(ApiError::BadRequest("No avatar file was sent".to_string()))
}

pub async fn fix_usernames(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    info!("POST /users/fixUsernames");

    let fixed = state.user_service.fix_usernames().await?;
    Ok(Json(MessageResponse {
        message: format!("{} usernames normalized", fixed),
    }))
}

pub async fn refresh_avatars(State(state): State<AppState>) -> Result<Json<AvatarRefreshResponse>, ApiError> {
    info!("POST /users/refreshAvatars");

    let users = state.user_service.refresh_avatars().await?;
    Ok(Json(AvatarRefreshResponse {
        message: format!("{} avatars refreshed", users.len()),
        users: users.into_iter().map(UserMapper::to_avatar_entry).collect(),
    }))
}
