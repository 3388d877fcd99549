//! Crate-wide error taxonomy and its JSON/HTTP mapping.
//!
//! Component errors (`ExtractError`, `LlmError`, `StoreError`) fold into
//! [`ChatError`], which is what handlers return and what the session
//! orchestrator sees from a [`ChatBackend`](crate::session::ChatBackend).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::db::StoreError;
use crate::doc_processor::ExtractError;
use crate::llm::LlmError;

/// JSON body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable summary.
    pub error: String,
    /// Machine-readable variant name, e.g. `invalid_input`.
    pub code: String,
    /// Underlying diagnostic, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Configuration(String),
    #[error("Failed to parse PDF: {0}")]
    Extraction(String),
    #[error("Failed to get response from model: {0}")]
    Upstream(String),
    #[error("Empty response from model")]
    EmptyResponse,
    #[error("Chat history unavailable: {0}")]
    Store(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatError::Configuration(_) | ChatError::Extraction(_) | ChatError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ChatError::Upstream(_) | ChatError::EmptyResponse => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChatError::InvalidInput(_) => "invalid_input",
            ChatError::Configuration(_) => "configuration",
            ChatError::Extraction(_) => "extraction",
            ChatError::Upstream(_) => "upstream",
            ChatError::EmptyResponse => "empty_response",
            ChatError::Store(_) => "store",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let (error, details) = match self {
            ChatError::InvalidInput(msg) | ChatError::Configuration(msg) => (msg.clone(), None),
            ChatError::Extraction(detail) => ("Failed to parse PDF".to_string(), Some(detail.clone())),
            ChatError::Upstream(detail) => (
                "Failed to get response from model".to_string(),
                Some(detail.clone()),
            ),
            ChatError::EmptyResponse => ("Empty response from model".to_string(), None),
            ChatError::Store(detail) => (
                "Failed to access chat history".to_string(),
                Some(detail.clone()),
            ),
        };
        ErrorBody {
            error,
            code: self.code().to_string(),
            details,
        }
    }

    /// Rebuild the error a server reported. Unknown codes become `Upstream`.
    pub fn from_body(status: u16, body: ErrorBody) -> Self {
        let detail = body.details.unwrap_or_else(|| body.error.clone());
        match body.code.as_str() {
            "invalid_input" => ChatError::InvalidInput(body.error),
            "configuration" => ChatError::Configuration(body.error),
            "extraction" => ChatError::Extraction(detail),
            "upstream" => ChatError::Upstream(detail),
            "empty_response" => ChatError::EmptyResponse,
            "store" => ChatError::Store(detail),
            _ => ChatError::Upstream(format!("HTTP {status}: {}", body.error)),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}

impl From<ExtractError> for ChatError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::InvalidInput(msg) => ChatError::InvalidInput(msg),
            ExtractError::Parse(detail) => ChatError::Extraction(detail),
        }
    }
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured(_) => ChatError::Configuration(err.to_string()),
            LlmError::EmptyResponse => ChatError::EmptyResponse,
            LlmError::Api { message, .. } => ChatError::Upstream(message),
            other => ChatError::Upstream(other.to_string()),
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        ChatError::Store(err.to_string())
    }
}

/// Failures that stop the server from coming up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
