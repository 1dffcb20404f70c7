use axum::{Router, routing::get};

use crate::state::AppState;

async fn index() -> &'static str {
    "School Management API is online"
}

async fn health_check() -> &'static str {
    "Healthy"
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/api/test", get(health_check))
}
