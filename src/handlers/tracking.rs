use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::AppState;

/// Public order tracking. No credentials required.
pub async fn track_transaction(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.ledger.get_by_tracking_code(&code).await.map_err(|e| match e {
        // Anonymous callers only ever learn "not found" or a generic failure.
        AppError::NotFound(_) => AppError::NotFound("Transaction not found".to_string()),
        other => other,
    })?;

    Ok(Json(view))
}
