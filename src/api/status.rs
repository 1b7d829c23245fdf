//! Last-cycle status endpoint.

use crate::api::AppState;
use crate::orchestration::StatusSnapshot;
use axum::extract::State;
use axum::Json;

pub async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot().await)
}
