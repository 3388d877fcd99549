pub mod gemini;
pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

pub use prompt::build_prompt;

/// Boundary to the remote text-generation service: one prompt in, one
/// complete answer out.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Which hosted API answers prompts, and with what credentials.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(gemini::GeminiConfig),
    OpenAi(openai::OpenAiConfig),
}

impl Provider {
    pub fn gemini(api_key: Option<String>) -> Self {
        Provider::Gemini(gemini::GeminiConfig {
            api_key,
            base_url: gemini::DEFAULT_BASE_URL.to_string(),
            model: gemini::DEFAULT_MODEL.to_string(),
        })
    }

    pub fn openai(api_key: Option<String>) -> Self {
        Provider::OpenAi(openai::OpenAiConfig {
            api_key,
            base_url: openai::DEFAULT_BASE_URL.to_string(),
            model: openai::DEFAULT_MODEL.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini(_) => "Gemini",
            Provider::OpenAi(_) => "OpenAI",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Gemini(config) => &config.model,
            Provider::OpenAi(config) => &config.model,
        }
    }
}

/// [`ModelGateway`] over one configured provider, sharing a single HTTP client.
#[derive(Debug, Clone)]
pub struct LlmGateway {
    client: Client,
    provider: Provider,
}

impl LlmGateway {
    pub fn new(provider: Provider) -> Self {
        Self::with_client(Client::new(), provider)
    }

    pub fn with_client(client: Client, provider: Provider) -> Self {
        Self { client, provider }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl ModelGateway for LlmGateway {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let answer = match &self.provider {
            Provider::Gemini(config) => gemini::generate(&self.client, config, prompt).await?,
            Provider::OpenAi(config) => openai::chat(&self.client, config, prompt).await?,
        };
        if answer.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(answer)
    }
}

/// Build the prompt for `question` (grounded in `context` when there is one)
/// and ask the gateway once.
pub async fn answer_question(
    gateway: &dyn ModelGateway,
    question: &str,
    context: &str,
) -> Result<String, LlmError> {
    let prompt = build_prompt(context, question);
    info!(
        question_chars = question.len(),
        context_chars = context.len(),
        "sending prompt to model"
    );
    match gateway.generate(&prompt).await {
        Ok(answer) => {
            info!(answer_chars = answer.len(), "received model answer");
            Ok(answer)
        }
        Err(e) => {
            warn!(error = %e, "model call failed");
            Err(e)
        }
    }
}

/// Returns the key, or `NotConfigured` when it is missing or blank.
pub(crate) fn require_key<'a>(
    api_key: Option<&'a str>,
    provider: &'static str,
) -> Result<&'a str, LlmError> {
    api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or(LlmError::NotConfigured(provider))
}

/// Mask an API key for display.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0} API key not set")]
    NotConfigured(&'static str),
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty response from model")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs can carry credentials; keep them out of error text.
        LlmError::Http(err.without_url())
    }
}
