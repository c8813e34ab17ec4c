use axum::{extract::State, response::IntoResponse, Json};

use crate::error::AppError;
use crate::middleware::AuthenticatedOperator;
use crate::AppState;

pub async fn stats(
    State(state): State<AppState>,
    AuthenticatedOperator(_operator): AuthenticatedOperator,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.dashboard.stats().await?;
    Ok(Json(stats))
}
