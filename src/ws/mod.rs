pub mod chat;
pub mod protocol;

use axum::{Router, routing::get};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws/chat", get(chat::ws_handler))
}
