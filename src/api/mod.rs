pub mod health;
pub mod status;

use crate::orchestration::StatusBoard;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub status: StatusBoard,
}

impl AppState {
    pub fn new(status: StatusBoard) -> Self {
        Self { status }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/status", get(status::get_status))
        .layer(cors)
        .with_state(state)
}
