use axum::Json;
use axum::extract::State;
use cohort_core::AppError;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Health payload with a live database probe.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health_handler(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|error| AppError::Internal(format!("database probe failed: {error}")))?;

    Ok(Json(HealthResponse { status: "ok" }))
}
