//! Server configuration, read from the environment at startup.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::llm::gemini::GeminiConfig;
use crate::llm::openai::OpenAiConfig;
use crate::llm::{gemini, mask_key, openai, Provider};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_DB_PATH: &str = "chat-history.db";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "pdf_chat=info,pdf_chat_lib=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown LLM_PROVIDER {0:?} (expected \"gemini\" or \"openai\")")]
    UnknownProvider(String),
}

/// Where chat turns are persisted.
#[derive(Clone)]
pub enum StoreSettings {
    Sqlite(PathBuf),
    Rest { url: String, api_key: String },
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSettings::Sqlite(path) => f.debug_tuple("Sqlite").field(path).finish(),
            StoreSettings::Rest { url, api_key } => f
                .debug_struct("Rest")
                .field("url", url)
                .field("api_key", &mask_key(api_key))
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub provider: Provider,
    pub store: StoreSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = get("PDF_CHAT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
            key: "PDF_CHAT_BIND",
            value: bind.clone(),
            reason: e.to_string(),
        })?;

        let max_upload_bytes = match get("PDF_CHAT_MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                key: "PDF_CHAT_MAX_UPLOAD_BYTES",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let provider_name = get("LLM_PROVIDER").unwrap_or_else(|| "gemini".to_string());
        let provider = match provider_name.to_ascii_lowercase().as_str() {
            "gemini" => Provider::Gemini(GeminiConfig {
                api_key: get("GEMINI_API_KEY"),
                base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
                model: get("GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            }),
            "openai" => Provider::OpenAi(OpenAiConfig {
                api_key: get("OPENAI_API_KEY"),
                base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
                model: get("OPENAI_MODEL").unwrap_or_else(|| openai::DEFAULT_MODEL.to_string()),
            }),
            _ => return Err(ConfigError::UnknownProvider(provider_name)),
        };

        let store = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(api_key)) => StoreSettings::Rest { url, api_key },
            _ => StoreSettings::Sqlite(
                get("PDF_CHAT_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()).into(),
            ),
        };

        Ok(Self {
            bind_addr,
            max_upload_bytes,
            provider,
            store,
        })
    }
}
