use axum::{Json, extract::State, response::IntoResponse};

use arcadia_types::api::VisitsResponse;

use crate::AppState;
use crate::error::ApiError;

/// POST /visits — one bump per front-end session; the client deduplicates.
pub async fn record_visit(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let count = state.db.increment_visits()?;
    Ok(Json(VisitsResponse { ok: true, count }))
}

pub async fn visit_count(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let count = state.db.get_visits()?;
    Ok(Json(VisitsResponse { ok: true, count }))
}
