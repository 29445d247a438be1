//! Translation of domain failures into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use shared::ErrorResponse;
use thiserror::Error;
use tracing::error;

use crate::domain::{LedgerError, ServiceError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ServiceError::Validation(msg) | ServiceError::Conflict(msg) => ApiError::BadRequest(msg),
            ServiceError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            ServiceError::Storage(e) => ApiError::Internal(e),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) | LedgerError::NoQualifyingPoint => ApiError::NotFound(err.to_string()),
            LedgerError::RateLimitExceeded { .. } | LedgerError::NoRecentActivity { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            LedgerError::RetractionWindowExpired => ApiError::Forbidden(err.to_string()),
            LedgerError::Storage(e) => ApiError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityKind;

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ledger_errors_map_to_statuses() {
        let cases = [
            (LedgerError::NotFound(EntityKind::Child), StatusCode::NOT_FOUND),
            (LedgerError::NoQualifyingPoint, StatusCode::NOT_FOUND),
            (
                LedgerError::RateLimitExceeded {
                    limit: 4,
                    window_hours: 4,
                },
                StatusCode::BAD_REQUEST,
            ),
            (LedgerError::NoRecentActivity { window_hours: 4 }, StatusCode::BAD_REQUEST),
            (LedgerError::RetractionWindowExpired, StatusCode::FORBIDDEN),
            (
                LedgerError::Storage(anyhow::anyhow!("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::from(ServiceError::NotFound(EntityKind::User)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await.error, "User not found");
    }

    #[tokio::test]
    async fn test_storage_details_are_not_leaked() {
        let response = ApiError::from(ServiceError::Storage(anyhow::anyhow!("UNIQUE constraint failed"))).into_response();
        assert_eq!(body_of(response).await.error, "Internal server error");
    }

    #[tokio::test]
    async fn test_invalid_credentials_is_unauthorized() {
        let response = ApiError::from(ServiceError::InvalidCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
