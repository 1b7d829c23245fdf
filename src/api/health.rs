use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the keeper has completed at least one cycle.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = state.status.snapshot().await;
    if snapshot.cycles == 0 {
        return Err(AppError::NotReady("no completed cycle yet".into()));
    }
    Ok(Json(serde_json::json!({"status": "ready"})))
}
