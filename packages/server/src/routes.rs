use crate::state::AppState;
use axum::{routing::get, Json, Router};

mod game;

pub use game::ErrorResponse;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/game", game::routes(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
