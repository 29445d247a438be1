use axum::extract::State;
use shared::BackfillResponse;
use tracing::info;

use super::error::ApiError;
use super::extract::Json;
use crate::AppState;

/// Credit legacy points without an author to the default account
pub async fn backfill_defaults(State(state): State<AppState>) -> Result<Json<BackfillResponse>, ApiError> {
    info!("POST /admin/defaults");

    let updated = state.admin_service.backfill_defaults().await?;
    Ok(Json(BackfillResponse {
        message: format!("{} points updated", updated),
        updated,
    }))
}

/// Liveness check
pub async fn root() -> &'static str {
    "Hello World"
}
