//! Hosted chat history behind a PostgREST (Supabase) `chat_history` table.

use super::models::{ChatTurn, NewChatTurn};
use super::{ChatStore, StoreError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

const TABLE: &str = "chat_history";

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for RestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .field("api_key", &crate::llm::mask_key(&self.api_key))
            .finish()
    }
}

/// Row shape of the hosted table; the document grouping column is `pdf_id`.
#[derive(Serialize)]
struct RestRow<'a> {
    user_id: &'a str,
    pdf_id: Option<&'a str>,
    question: &'a str,
    answer: &'a str,
}

#[derive(Deserialize)]
struct RestErrorBody {
    message: String,
}

impl RestStore {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{TABLE}", self.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key).bearer_auth(&self.api_key)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, StoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<RestErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    Err(StoreError::Api { status, message })
}

#[async_trait]
impl ChatStore for RestStore {
    async fn append(&self, turn: &NewChatTurn) -> Result<(), StoreError> {
        let row = RestRow {
            user_id: &turn.user_id,
            pdf_id: turn.document_id.as_deref(),
            question: &turn.question,
            answer: &turn.answer,
        };
        let resp = self
            .authorize(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(&[row])
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn query(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<ChatTurn>, StoreError> {
        let mut filters = vec![
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
        ];
        if let Some(doc) = document_id {
            filters.push(("pdf_id", format!("eq.{doc}")));
        }
        filters.push(("order", "created_at.desc".to_string()));

        let resp = self
            .authorize(self.client.get(self.table_url()))
            .query(&filters)
            .send()
            .await?;
        let rows = ensure_success(resp).await?.json::<Vec<ChatTurn>>().await?;
        Ok(rows)
    }
}
