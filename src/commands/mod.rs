pub mod chat;
pub mod document;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// All HTTP endpoints, mounted under `/api/`.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/parse-pdf",
            post(document::parse_pdf).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/chat", post(chat::generate))
        .route("/api/save-chat", post(chat::save_chat))
        .route("/api/get-chats", post(chat::get_chats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
