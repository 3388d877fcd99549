//! Shared application state and the in-process request operations.
//!
//! Handlers and the in-process [`ChatBackend`](crate::session::ChatBackend)
//! both go through the methods here, so validation and logging live in one
//! place.

use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::config::{Config, StoreSettings, DEFAULT_MAX_UPLOAD_BYTES};
use crate::db::models::{ChatTurn, NewChatTurn};
use crate::db::rest::RestStore;
use crate::db::{ChatStore, Database, StoreError};
use crate::doc_processor::{self, DocumentUpload};
use crate::error::ChatError;
use crate::llm::{self, LlmGateway, ModelGateway};

/// Cloned into every handler; the clients inside are built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ModelGateway>,
    pub store: Arc<dyn ChatStore>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ModelGateway>, store: Arc<dyn ChatStore>) -> Self {
        Self {
            gateway,
            store,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let client = Client::new();
        let gateway = LlmGateway::with_client(client.clone(), config.provider.clone());
        let store: Arc<dyn ChatStore> = match &config.store {
            StoreSettings::Sqlite(path) => {
                info!(path = %path.display(), "using SQLite chat history");
                Arc::new(Database::open(path)?)
            }
            StoreSettings::Rest { url, api_key } => {
                info!(url = %url, "using hosted chat history");
                Arc::new(RestStore::new(client, url.clone(), api_key.clone()))
            }
        };
        Ok(Self::new(Arc::new(gateway), store).with_max_upload_bytes(config.max_upload_bytes))
    }

    pub async fn extract(&self, upload: Option<DocumentUpload>) -> Result<String, ChatError> {
        let text = doc_processor::extract_text_blocking(upload).await?;
        info!(chars = text.len(), "parsed PDF upload");
        Ok(text)
    }

    pub async fn generate(&self, question: &str, context: &str) -> Result<String, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::InvalidInput("question is required".into()));
        }
        Ok(llm::answer_question(self.gateway.as_ref(), question, context).await?)
    }

    pub async fn append(&self, turn: &NewChatTurn) -> Result<(), ChatError> {
        require_user(&turn.user_id)?;
        self.store.append(turn).await?;
        info!(
            user_id = %turn.user_id,
            document_id = turn.document_id.as_deref().unwrap_or("-"),
            "saved chat turn"
        );
        Ok(())
    }

    pub async fn query(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<ChatTurn>, ChatError> {
        require_user(user_id)?;
        let turns = self.store.query(user_id, document_id).await?;
        info!(user_id, turns = turns.len(), "loaded chat history");
        Ok(turns)
    }
}

fn require_user(user_id: &str) -> Result<(), ChatError> {
    if user_id.trim().is_empty() {
        return Err(ChatError::InvalidInput("user_id is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{StubGateway, StubReply};

    fn state(reply: StubReply) -> (AppState, Arc<StubGateway>) {
        let gateway = Arc::new(StubGateway::new(reply));
        let store = Arc::new(Database::in_memory().unwrap());
        (AppState::new(gateway.clone(), store), gateway)
    }

    #[tokio::test]
    async fn blank_question_never_reaches_gateway() {
        let (state, gateway) = state(StubReply::Answer("unused".into()));
        let err = state.generate("  ", "context").await.unwrap_err();
        assert_eq!(err, ChatError::InvalidInput("question is required".into()));
        assert!(gateway.prompts().is_empty());
    }

    #[tokio::test]
    async fn gateway_failures_become_chat_errors() {
        let (state, _) = state(StubReply::Fail("rate limited".into()));
        assert_eq!(
            state.generate("Hello", "").await,
            Err(ChatError::Upstream("rate limited".into()))
        );

        let (empty_state, _) = self::state(StubReply::Empty);
        assert_eq!(empty_state.generate("Hello", "").await, Err(ChatError::EmptyResponse));
    }

    #[tokio::test]
    async fn history_requires_user() {
        let (state, _) = state(StubReply::Answer("a".into()));
        assert!(matches!(state.query("", None).await, Err(ChatError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn from_config_opens_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("history.db");
        let db_path_str = db_path.to_string_lossy().to_string();
        let config = Config::from_lookup(|key| match key {
            "PDF_CHAT_DB" => Some(db_path_str.clone()),
            "PDF_CHAT_MAX_UPLOAD_BYTES" => Some("1024".into()),
            _ => None,
        })
        .unwrap();

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.max_upload_bytes, 1024);
        assert!(db_path.exists());

        state
            .append(&NewChatTurn {
                user_id: "u1".into(),
                document_id: None,
                question: "Hello".into(),
                answer: "Hi".into(),
            })
            .await
            .unwrap();
        assert_eq!(state.query("u1", None).await.unwrap().len(), 1);
    }
}
