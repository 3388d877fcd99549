use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::commands::chat::{GenerateRequest, GenerateResponse, GetChatsRequest, GetChatsResponse, SaveChatResponse};
use crate::commands::document::{ExtractResponse, FILE_FIELD};
use crate::db::models::{ChatTurn, NewChatTurn};
use crate::doc_processor::DocumentUpload;
use crate::error::{ChatError, ErrorBody};
use crate::state::AppState;

/// The four operations a [`ChatSession`](super::ChatSession) needs.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn extract(&self, upload: DocumentUpload) -> Result<String, ChatError>;
    async fn generate(&self, question: &str, context: &str) -> Result<String, ChatError>;
    async fn append(&self, turn: &NewChatTurn) -> Result<(), ChatError>;
    async fn query(&self, user_id: &str, document_id: Option<&str>) -> Result<Vec<ChatTurn>, ChatError>;
}

/// In-process: calls the components directly.
#[async_trait]
impl ChatBackend for AppState {
    async fn extract(&self, upload: DocumentUpload) -> Result<String, ChatError> {
        AppState::extract(self, Some(upload)).await
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, ChatError> {
        AppState::generate(self, question, context).await
    }

    async fn append(&self, turn: &NewChatTurn) -> Result<(), ChatError> {
        AppState::append(self, turn).await
    }

    async fn query(&self, user_id: &str, document_id: Option<&str>) -> Result<Vec<ChatTurn>, ChatError> {
        AppState::query(self, user_id, document_id).await
    }
}

/// Talks to a running server over its JSON endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ChatError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }
}

fn transport(err: reqwest::Error) -> ChatError {
    ChatError::Upstream(err.without_url().to_string())
}

/// Success bodies deserialize as `T`; error bodies map back to a [`ChatError`].
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ChatError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<T>().await.map_err(transport);
    }
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Err(ChatError::from_body(status.as_u16(), body)),
        Err(_) => Err(ChatError::Upstream(format!("HTTP {}: {}", status.as_u16(), text))),
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn extract(&self, upload: DocumentUpload) -> Result<String, ChatError> {
        let mut part = Part::bytes(upload.bytes)
            .file_name(upload.file_name.unwrap_or_else(|| "upload.pdf".to_string()));
        if let Some(content_type) = upload.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| ChatError::InvalidInput(format!("Invalid content type: {e}")))?;
        }
        let form = Form::new().part(FILE_FIELD, part);
        let resp = self
            .client
            .post(self.url("/api/parse-pdf"))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let body: ExtractResponse = decode(resp).await?;
        Ok(body.text)
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, ChatError> {
        let request = GenerateRequest {
            question: question.to_string(),
            pdf_text: context.to_string(),
        };
        let body: GenerateResponse = self.post_json("/api/chat", &request).await?;
        Ok(body.answer)
    }

    async fn append(&self, turn: &NewChatTurn) -> Result<(), ChatError> {
        let _: SaveChatResponse = self.post_json("/api/save-chat", turn).await?;
        Ok(())
    }

    async fn query(&self, user_id: &str, document_id: Option<&str>) -> Result<Vec<ChatTurn>, ChatError> {
        let request = GetChatsRequest {
            user_id: user_id.to_string(),
            document_id: document_id.map(str::to_string),
        };
        let body: GetChatsResponse = self.post_json("/api/get-chats", &request).await?;
        Ok(body.chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::router;
    use crate::db::Database;
    use crate::llm::{LlmGateway, Provider};
    use crate::session::{ChatMode, ChatSession, HistoryScope, Message, SessionError};
    use crate::test_support::{sample_pdf, spawn_server, StubGateway, StubReply};
    use std::sync::Arc;

    async fn serve(state: AppState) -> HttpBackend {
        HttpBackend::new(spawn_server(router(state)).await)
    }

    fn stub_state(reply: StubReply) -> (AppState, Arc<StubGateway>) {
        let gateway = Arc::new(StubGateway::new(reply));
        let store = Arc::new(Database::in_memory().unwrap());
        (AppState::new(gateway.clone(), store), gateway)
    }

    #[tokio::test]
    async fn pdf_conversation_over_http() {
        let (state, gateway) = stub_state(StubReply::Answer("$42".into()));
        let backend = serve(state).await;
        let mut session = ChatSession::new("u1");

        let upload = DocumentUpload::pdf("invoice.pdf", sample_pdf(&["Invoice total: $42."]));
        session.upload(&backend, upload).await.unwrap();
        assert!(session.document_text().contains("Invoice"));

        session.send(&backend, "What is the total?").await.unwrap();
        assert_eq!(
            session.messages(),
            &[Message::user("What is the total?"), Message::assistant("$42")]
        );
        let prompt = gateway.prompts().remove(0);
        assert!(prompt.contains("Invoice"));
        assert!(prompt.contains("What is the total?"));

        let history = session
            .load_history(&backend, HistoryScope::CurrentDocument)
            .await
            .unwrap();
        assert_eq!(
            history,
            &[Message::user("What is the total?"), Message::assistant("$42")]
        );
    }

    #[tokio::test]
    async fn rejected_upload_maps_to_invalid_input() {
        let (state, _) = stub_state(StubReply::Empty);
        let backend = serve(state).await;
        let upload = DocumentUpload {
            file_name: Some("notes.txt".into()),
            content_type: Some("text/plain".into()),
            bytes: b"hello".to_vec(),
        };

        let err = backend.extract(upload).await.unwrap_err();
        assert_eq!(
            err,
            ChatError::InvalidInput("Invalid file type. Please upload a PDF.".into())
        );
    }

    #[tokio::test]
    async fn missing_credential_shows_inline() {
        let gateway = Arc::new(LlmGateway::new(Provider::gemini(None)));
        let store = Arc::new(Database::in_memory().unwrap());
        let backend = serve(AppState::new(gateway, store)).await;
        let mut session = ChatSession::new("u1");
        session.set_mode(ChatMode::Free).unwrap();

        session.send(&backend, "Hello").await.unwrap();

        assert_eq!(session.messages()[1], Message::assistant("Gemini API key not set"));
        assert!(backend.query("u1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_error_round_trips() {
        let (state, _) = stub_state(StubReply::Fail("rate limited".into()));
        let backend = serve(state).await;
        assert_eq!(
            backend.generate("Hello", "").await,
            Err(ChatError::Upstream("rate limited".into()))
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_upstream_error() {
        let backend = HttpBackend::new("http://127.0.0.1:1");
        let mut session = ChatSession::new("u1");
        let err = session
            .load_history(&backend, HistoryScope::User)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Backend(ChatError::Upstream(_))));
    }

    #[tokio::test]
    async fn in_process_backend_matches_http() {
        let (state, _) = stub_state(StubReply::Answer("Hi!".into()));
        let mut session = ChatSession::new("u1");
        session.set_mode(ChatMode::Free).unwrap();

        session.send(&state, "Hello").await.unwrap();

        let stored = ChatBackend::query(&state, "u1", None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].question, "Hello");
        assert_eq!(stored[0].answer, "Hi!");
        assert_eq!(stored[0].document_id, None);
    }
}
