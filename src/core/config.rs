//! Configuration for the chat core and the proxy.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::errors::ConfigError;

/// Environment variable holding the `SQLite` database path.
pub const DB_PATH_ENV: &str = "KATAGRAFY_DB_PATH";
/// Environment variable holding the blob directory.
pub const BLOB_DIR_ENV: &str = "KATAGRAFY_BLOB_DIR";
/// Environment variable holding the public base URL for stored files.
pub const PUBLIC_URL_ENV: &str = "KATAGRAFY_PUBLIC_URL";
/// Environment variable holding the proxy base URL used by clients.
pub const PROXY_URL_ENV: &str = "KATAGRAFY_PROXY_URL";
/// Environment variable holding the proxy listen port.
pub const PORT_ENV: &str = "KATAGRAFY_PORT";
/// Environment variable letting the proxy relay private targets (`1` or `true`).
pub const ALLOW_PRIVATE_HOSTS_ENV: &str = "KATAGRAFY_ALLOW_PRIVATE_HOSTS";
/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable overriding the Gemini model.
pub const GEMINI_MODEL_ENV: &str = "KATAGRAFY_GEMINI_MODEL";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend store settings.
    pub backend: BackendConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Orchestrator settings.
    pub chat: ChatConfig,
    /// Content extraction settings.
    pub extraction: ExtractionConfig,
    /// Proxy server settings.
    pub server: ServerConfig,
    /// Spreadsheet export settings.
    pub export: ExportConfig,
}

impl AppConfig {
    /// Defaults overridden by `KATAGRAFY_*` and `GEMINI_API_KEY` variables.
    ///
    /// # Errors
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            config.backend.sqlite_path = Some(PathBuf::from(path));
        }
        if let Ok(dir) = std::env::var(BLOB_DIR_ENV) {
            config.backend.blob_dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = std::env::var(PUBLIC_URL_ENV) {
            config.backend.public_base_url = url;
        }
        if let Ok(url) = std::env::var(PROXY_URL_ENV) {
            config.llm.proxy_url = url;
        }
        if let Ok(key) = std::env::var(GEMINI_API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.llm.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var(GEMINI_MODEL_ENV) {
            config.llm.model = model;
        }
        if let Ok(flag) = std::env::var(ALLOW_PRIVATE_HOSTS_ENV) {
            config.extraction.allow_private_hosts = matches!(flag.trim(), "1" | "true");
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} must be a port number")))?;
        }

        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.title_max_chars == 0 {
            return Err(ConfigError::Invalid(
                "chat.title_max_chars must be > 0".to_string(),
            ));
        }

        if self.chat.context_file_limit == 0 {
            return Err(ConfigError::Invalid(
                "chat.context_file_limit must be > 0".to_string(),
            ));
        }

        if self.chat.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "chat.request_timeout must be > 0".to_string(),
            ));
        }

        if self.extraction.max_chars == 0 {
            return Err(ConfigError::Invalid(
                "extraction.max_chars must be > 0".to_string(),
            ));
        }

        if self.extraction.max_pdf_pages == 0 {
            return Err(ConfigError::Invalid(
                "extraction.max_pdf_pages must be > 0".to_string(),
            ));
        }

        if self.export.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "export.max_sessions must be > 0".to_string(),
            ));
        }

        Url::parse(&self.backend.public_base_url)?;
        Url::parse(&self.llm.proxy_url)?;
        Url::parse(&self.llm.gemini_base_url)?;

        Ok(())
    }
}

/// Backend store location. Missing paths mean the backend is not configured.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// `SQLite` database path.
    pub sqlite_path: Option<PathBuf>,
    /// Directory holding uploaded blobs.
    pub blob_dir: Option<PathBuf>,
    /// Base URL under which blobs are publicly served.
    pub public_base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            blob_dir: None,
            public_base_url: "http://127.0.0.1:3000/files".to_string(),
        }
    }
}

/// Language model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the LLM proxy (the `/api/gemini` route is appended).
    pub proxy_url: String,
    /// Gemini REST base URL.
    pub gemini_base_url: String,
    /// Gemini model name.
    pub model: String,
    /// API key for the proxy or for direct-key mode.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Optional output token cap.
    pub max_output_tokens: Option<u32>,
    /// HTTP request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// HTTP connect timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            proxy_url: "http://127.0.0.1:3000".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            temperature: 0.7,
            max_output_tokens: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl LlmConfig {
    /// Set the proxy base URL.
    #[must_use]
    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = url.into();
        self
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the Gemini base URL.
    #[must_use]
    pub fn with_gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.gemini_base_url = url.into();
        self
    }
}

/// Orchestrator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Characters kept from the first message when deriving a title.
    pub title_max_chars: usize,
    /// Title used when a session starts without a message.
    pub default_title: String,
    /// Number of most recent files forwarded as context.
    pub context_file_limit: usize,
    /// Bound on every gateway and LLM call.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            title_max_chars: 30,
            default_title: "New Chat".to_string(),
            context_file_limit: 3,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ChatConfig {
    /// Set the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Content extraction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Characters kept from an extracted text before the truncation marker.
    pub max_chars: usize,
    /// Pages read from a PDF.
    pub max_pdf_pages: u32,
    /// Maximum bytes downloaded for a URL reference.
    pub max_download_bytes: u64,
    /// Proxy route used for server-side URL fetches; `None` goes direct.
    pub fetch_proxy_url: Option<String>,
    /// Let the proxy relay loopback, private and link-local targets.
    #[serde(default)]
    pub allow_private_hosts: bool,
    /// HTTP request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_chars: 50_000,
            max_pdf_pages: 20,
            max_download_bytes: 10 * 1024 * 1024,
            fetch_proxy_url: None,
            allow_private_hosts: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ExtractionConfig {
    /// Route URL fetches through the proxy at `base_url`.
    #[must_use]
    pub fn with_fetch_proxy(mut self, base_url: impl Into<String>) -> Self {
        self.fetch_proxy_url = Some(base_url.into());
        self
    }

    /// Let the proxy relay requests to non-public addresses (local development).
    #[must_use]
    pub const fn allowing_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }
}

/// Proxy server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Spreadsheet export settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Most recent sessions exported.
    pub max_sessions: usize,
    /// Product name used in the file name.
    pub product_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_sessions: 20,
            product_name: "Katagrafy".to_string(),
        }
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
