//! Shared fakes for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use printpdf::{BuiltinFont, Mm, PdfDocument};

use crate::db::models::{ChatTurn, NewChatTurn};
use crate::db::{ChatStore, StoreError};
use crate::llm::{LlmError, ModelGateway};

/// A one-page PDF with `lines` set in Helvetica.
pub fn sample_pdf(lines: &[&str]) -> Vec<u8> {
    let (doc, page, layer) = PdfDocument::new("sample", Mm(210.0), Mm(297.0), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).unwrap();
    let layer = doc.get_page(page).get_layer(layer);
    for (i, line) in lines.iter().enumerate() {
        layer.use_text(*line, 12.0, Mm(20.0), Mm(270.0 - 10.0 * i as f32), &font);
    }
    doc.save_to_bytes().unwrap()
}

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A single-field `multipart/form-data` body and its content-type header.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "pdf-chat-test-boundary";
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

#[derive(Debug, Clone)]
pub enum StubReply {
    Answer(String),
    /// Provider-side failure with this message.
    Fail(String),
    Empty,
}

/// Gateway with a fixed reply that records every prompt it receives.
#[derive(Debug)]
pub struct StubGateway {
    reply: StubReply,
    prompts: Mutex<Vec<String>>,
}

impl StubGateway {
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for StubGateway {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            StubReply::Answer(answer) => Ok(answer.clone()),
            StubReply::Fail(message) => Err(LlmError::Api {
                status: 429,
                message: message.clone(),
            }),
            StubReply::Empty => Err(LlmError::EmptyResponse),
        }
    }
}

/// In-memory store that counts append attempts and can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingStore {
    turns: Mutex<Vec<ChatTurn>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn appended(&self) -> Vec<NewChatTurn> {
        self.turns
            .lock()
            .unwrap()
            .iter()
            .map(|t| NewChatTurn {
                user_id: t.user_id.clone(),
                document_id: t.document_id.clone(),
                question: t.question.clone(),
                answer: t.answer.clone(),
            })
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatStore for RecordingStore {
    async fn append(&self, turn: &NewChatTurn) -> Result<(), StoreError> {
        let seq = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Api {
                status: 503,
                message: "store offline".to_string(),
            });
        }
        self.turns.lock().unwrap().push(ChatTurn {
            user_id: turn.user_id.clone(),
            document_id: turn.document_id.clone(),
            question: turn.question.clone(),
            answer: turn.answer.clone(),
            created_at: format!("2025-01-01T00:00:{seq:02}.000Z"),
        });
        Ok(())
    }

    async fn query(&self, user_id: &str, document_id: Option<&str>) -> Result<Vec<ChatTurn>, StoreError> {
        Ok(self
            .turns
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .filter(|t| document_id.is_none() || t.document_id.as_deref() == document_id)
            .cloned()
            .collect())
    }
}
