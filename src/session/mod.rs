//! Client-side conversation state.
//!
//! [`ChatSession`] is the explicit state machine behind the chat screen:
//! it owns the live message list, the active document text and the history
//! view, and drives a [`ChatBackend`] through upload, send and history
//! actions. Every action takes `&mut self`, so two transitions on the same
//! session can never overlap.
//!
//! ```text
//! Idle ──begin_upload──▶ DocumentLoading ──finish_upload(Ok)──▶ DocumentReady
//!   ▲                          │                                     │
//!   └──────finish_upload(Err)──┘                         begin_send  ▼
//! AiModeReady ──begin_send──▶ Sending ──complete_send──▶ DocumentReady | AiModeReady
//! ```

mod backend;

pub use backend::{ChatBackend, HttpBackend};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::models::NewChatTurn;
use crate::doc_processor::DocumentUpload;
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// What the chat view renders. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    /// Questions are grounded in the uploaded PDF.
    #[default]
    Document,
    /// Questions go to the model without context.
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DocumentLoading,
    DocumentReady,
    AiModeReady,
    Sending,
}

impl SessionState {
    pub fn is_busy(self) -> bool {
        matches!(self, SessionState::DocumentLoading | SessionState::Sending)
    }
}

/// How a failed generation shows up in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureDisplay {
    /// The error text is appended as an assistant message.
    #[default]
    Inline,
    /// Nothing is appended; the error is kept in [`ChatSession::last_error`].
    Separate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    /// Every turn the user has stored.
    User,
    /// Only turns asked against the active document.
    CurrentDocument,
}

#[derive(Debug, Clone)]
pub struct ActiveDocument {
    pub id: String,
    pub file_name: Option<String>,
    pub text: String,
}

/// A question that has been shown to the user but not yet answered.
#[derive(Debug)]
pub struct PendingTurn {
    question: String,
    context: String,
    document_id: Option<String>,
    mode: ChatMode,
}

impl PendingTurn {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("another action is still in progress")]
    Busy,
    #[error("question is empty")]
    EmptyQuestion,
    #[error("no document text loaded")]
    NoDocument,
    #[error("uploads are only available in document mode")]
    WrongMode,
    #[error("expected state {expected:?}, found {actual:?}")]
    UnexpectedState {
        expected: SessionState,
        actual: SessionState,
    },
    #[error(transparent)]
    Backend(#[from] ChatError),
}

#[derive(Debug)]
pub struct ChatSession {
    user_id: String,
    mode: ChatMode,
    state: SessionState,
    document: Option<ActiveDocument>,
    messages: Vec<Message>,
    history: Vec<Message>,
    last_error: Option<String>,
    failure_display: FailureDisplay,
}

impl ChatSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            mode: ChatMode::Document,
            state: SessionState::Idle,
            document: None,
            messages: Vec::new(),
            history: Vec::new(),
            last_error: None,
            failure_display: FailureDisplay::Inline,
        }
    }

    pub fn with_failure_display(mut self, failure_display: FailureDisplay) -> Self {
        self.failure_display = failure_display;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn document(&self) -> Option<&ActiveDocument> {
        self.document.as_ref()
    }

    /// Active document text, empty when none is loaded.
    pub fn document_text(&self) -> &str {
        self.document.as_ref().map(|d| d.text.as_str()).unwrap_or("")
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ready_state(&self) -> SessionState {
        match (self.mode, &self.document) {
            (ChatMode::Free, _) => SessionState::AiModeReady,
            (ChatMode::Document, Some(_)) => SessionState::DocumentReady,
            (ChatMode::Document, None) => SessionState::Idle,
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state != expected {
            return Err(SessionError::UnexpectedState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Switch between document and free chat. The live messages stay.
    pub fn set_mode(&mut self, mode: ChatMode) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        self.mode = mode;
        self.state = self.ready_state();
        Ok(())
    }

    // ── Upload ──

    pub fn begin_upload(&mut self) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        if self.mode != ChatMode::Document {
            return Err(SessionError::WrongMode);
        }
        self.document = None;
        self.last_error = None;
        self.state = SessionState::DocumentLoading;
        Ok(())
    }

    /// On success the document becomes active under a fresh id and the live
    /// conversation starts over. On failure the session falls back to `Idle`.
    pub fn finish_upload(
        &mut self,
        file_name: Option<String>,
        result: Result<String, ChatError>,
    ) -> Result<&ActiveDocument, SessionError> {
        self.expect_state(SessionState::DocumentLoading)?;
        match result {
            Ok(text) => {
                self.messages.clear();
                self.state = SessionState::DocumentReady;
                let document = self.document.insert(ActiveDocument {
                    id: uuid::Uuid::new_v4().to_string(),
                    file_name,
                    text,
                });
                info!(document_id = %document.id, chars = document.text.len(), "document ready");
                Ok(&*document)
            }
            Err(e) => {
                warn!(error = %e, "document upload failed");
                self.state = SessionState::Idle;
                self.last_error = Some(e.to_string());
                Err(SessionError::Backend(e))
            }
        }
    }

    pub async fn upload(
        &mut self,
        backend: &dyn ChatBackend,
        upload: DocumentUpload,
    ) -> Result<&ActiveDocument, SessionError> {
        self.begin_upload()?;
        let file_name = upload.file_name.clone();
        let result = backend.extract(upload).await;
        self.finish_upload(file_name, result)
    }

    // ── Send ──

    /// Whether `question` may be sent right now.
    pub fn check_send(&self, question: &str) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        if question.trim().is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if self.mode == ChatMode::Document && self.document_text().is_empty() {
            return Err(SessionError::NoDocument);
        }
        Ok(())
    }

    /// Show the question immediately and enter `Sending`.
    pub fn begin_send(&mut self, question: &str) -> Result<PendingTurn, SessionError> {
        self.check_send(question)?;
        let (context, document_id) = match (self.mode, &self.document) {
            (ChatMode::Document, Some(doc)) => (doc.text.clone(), Some(doc.id.clone())),
            _ => (String::new(), None),
        };
        self.messages.push(Message::user(question));
        self.last_error = None;
        self.state = SessionState::Sending;
        Ok(PendingTurn {
            question: question.to_string(),
            context,
            document_id,
            mode: self.mode,
        })
    }

    /// Apply the model's response. Returns the turn to persist when there is
    /// an answer.
    pub fn complete_send(
        &mut self,
        pending: PendingTurn,
        result: Result<String, ChatError>,
    ) -> Result<Option<NewChatTurn>, SessionError> {
        self.expect_state(SessionState::Sending)?;
        self.mode = pending.mode;
        self.state = self.ready_state();
        match result {
            Ok(answer) => {
                self.messages.push(Message::assistant(answer.clone()));
                Ok(Some(NewChatTurn {
                    user_id: self.user_id.clone(),
                    document_id: pending.document_id,
                    question: pending.question,
                    answer,
                }))
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                match self.failure_display {
                    FailureDisplay::Inline => self.messages.push(Message::assistant(e.to_string())),
                    FailureDisplay::Separate => self.last_error = Some(e.to_string()),
                }
                Ok(None)
            }
        }
    }

    /// Full send: optimistic display, one model call, then a single save.
    /// A failed save is logged and otherwise ignored.
    pub async fn send(&mut self, backend: &dyn ChatBackend, question: &str) -> Result<(), SessionError> {
        let pending = self.begin_send(question)?;
        let result = backend.generate(pending.question(), pending.context()).await;
        if let Some(turn) = self.complete_send(pending, result)? {
            if let Err(e) = backend.append(&turn).await {
                warn!(user_id = %turn.user_id, error = %e, "failed to save chat turn");
            }
        }
        Ok(())
    }

    // ── History ──

    /// Replace the history view with stored turns, newest first, each
    /// expanded to a question and its answer.
    pub async fn load_history(
        &mut self,
        backend: &dyn ChatBackend,
        scope: HistoryScope,
    ) -> Result<&[Message], SessionError> {
        let document_id = match scope {
            HistoryScope::User => None,
            HistoryScope::CurrentDocument => {
                Some(self.document.as_ref().ok_or(SessionError::NoDocument)?.id.clone())
            }
        };
        let turns = match backend.query(&self.user_id, document_id.as_deref()).await {
            Ok(turns) => turns,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(SessionError::Backend(e));
            }
        };
        self.history = turns
            .into_iter()
            .flat_map(|t| [Message::user(t.question), Message::assistant(t.answer)])
            .collect();
        Ok(&self.history)
    }
}
