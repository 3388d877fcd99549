use serde::{Deserialize, Serialize};

/// One persisted question/answer exchange. `document_id` is `None` for free chat.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub user_id: String,
    #[serde(default, alias = "pdf_id")]
    pub document_id: Option<String>,
    pub question: String,
    pub answer: String,
    pub created_at: String,
}

/// Insert payload for a turn; the store assigns `created_at`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NewChatTurn {
    pub user_id: String,
    #[serde(default, alias = "pdf_id")]
    pub document_id: Option<String>,
    pub question: String,
    pub answer: String,
}
