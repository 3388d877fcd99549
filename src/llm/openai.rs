use super::{mask_key, require_key, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_deref().map(mask_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

pub async fn chat(client: &Client, config: &OpenAiConfig, prompt: &str) -> Result<String, LlmError> {
    let api_key = require_key(config.api_key.as_deref(), "OpenAI")?;

    let body = OpenAiRequest {
        model: &config.model,
        messages: vec![OpenAiMessage {
            role: "user",
            content: prompt,
        }],
        stream: false,
    };

    let resp = client
        .post(format!("{}/chat/completions", config.base_url.trim_end_matches('/')))
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OpenAiErrorEnvelope>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        return Err(LlmError::Api { status, message });
    }

    let data: OpenAiResponse = resp
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.without_url().to_string()))?;
    let content = data
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmGateway, ModelGateway, Provider};
    use crate::test_support::spawn_server;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn gateway(base_url: String) -> LlmGateway {
        LlmGateway::new(Provider::OpenAi(OpenAiConfig {
            api_key: Some("sk-test".into()),
            base_url,
            model: "local-model".into(),
        }))
    }

    #[tokio::test]
    async fn returns_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "local-model");
                assert_eq!(body["messages"][0]["role"], "user");
                let prompt = body["messages"][0]["content"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "choices": [ { "message": { "role": "assistant", "content": format!("echo: {prompt}") } } ]
                }))
            }),
        );
        let base_url = format!("{}/v1", spawn_server(app).await);

        let answer = gateway(base_url).generate("Hello").await.unwrap();
        assert_eq!(answer, "echo: Hello");
    }

    #[tokio::test]
    async fn error_body_message_is_extracted() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Incorrect API key provided" } })),
                )
            }),
        );
        let base_url = format!("{}/v1", spawn_server(app).await);

        match gateway(base_url).generate("Hello").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn null_content_is_empty_response() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [ { "message": { "content": null } } ] })) }),
        );
        let base_url = format!("{}/v1", spawn_server(app).await);

        assert!(matches!(
            gateway(base_url).generate("Hello").await,
            Err(LlmError::EmptyResponse)
        ));
    }
}
