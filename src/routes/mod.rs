use axum::Router;

use crate::state::AppState;

pub mod chat;
pub mod home;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(home::routes())
        .merge(chat::routes())
        .merge(crate::ws::routes())
        .with_state(state)
}
