use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::models::{ChatTurn, NewChatTurn};
use crate::error::ChatError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub question: String,
    /// Extracted document text; empty for free chat.
    #[serde(rename = "pdfText", default)]
    pub pdf_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveChatResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetChatsRequest {
    pub user_id: String,
    #[serde(default, alias = "pdf_id")]
    pub document_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetChatsResponse {
    pub chats: Vec<ChatTurn>,
}

fn invalid_json(rejection: JsonRejection) -> ChatError {
    ChatError::InvalidInput(rejection.body_text())
}

/// `POST /api/chat`
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ChatError> {
    let Json(req) = payload.map_err(invalid_json)?;
    let answer = state.generate(&req.question, &req.pdf_text).await?;
    Ok(Json(GenerateResponse { answer }))
}

/// `POST /api/save-chat`
pub async fn save_chat(
    State(state): State<AppState>,
    payload: Result<Json<NewChatTurn>, JsonRejection>,
) -> Result<Json<SaveChatResponse>, ChatError> {
    let Json(turn) = payload.map_err(invalid_json)?;
    state.append(&turn).await?;
    Ok(Json(SaveChatResponse { success: true }))
}

/// `POST /api/get-chats`
pub async fn get_chats(
    State(state): State<AppState>,
    payload: Result<Json<GetChatsRequest>, JsonRejection>,
) -> Result<Json<GetChatsResponse>, ChatError> {
    let Json(req) = payload.map_err(invalid_json)?;
    let chats = state.query(&req.user_id, req.document_id.as_deref()).await?;
    Ok(Json(GetChatsResponse { chats }))
}
