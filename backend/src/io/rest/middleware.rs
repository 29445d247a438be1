//! Bearer token authentication for the protected routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::error::ApiError;
use crate::AppState;

/// Id of the user a request was authenticated as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

/// Missing token: 401. Malformed, expired or foreign token: 403.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return ApiError::Unauthorized("Token not provided".to_string()).into_response();
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match token.and_then(|token| state.user_service.authenticate(token)) {
        Some(user_id) => {
            request.extensions_mut().insert(AuthenticatedUser(user_id));
            next.run(request).await
        }
        None => {
            warn!("Rejected request to {} with an invalid token", request.uri().path());
            ApiError::Forbidden("Invalid token".to_string()).into_response()
        }
    }
}
