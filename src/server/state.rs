//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::core::config::{AppConfig, ExtractionConfig};
use crate::llm::{CompletionTransport, GeminiClient, SuggestionParser};

use super::guard::{PublicOnlyResolver, public_redirects};

/// Shared proxy state.
pub struct AppState {
    /// Upstream completion transport (Gemini in production).
    pub completion: Arc<dyn CompletionTransport>,
    /// Normalizes suggestion answers.
    pub suggestions: SuggestionParser,
    /// Client used by `/api/fetch-url`.
    pub http: reqwest::Client,
    /// Largest upstream body relayed by `/api/fetch-url`.
    pub max_fetch_bytes: u64,
    /// Relay loopback and private targets too.
    pub allow_private_hosts: bool,
}

impl AppState {
    /// Create state backed by the Gemini REST API.
    ///
    /// # Errors
    /// Returns an error if no API key is configured or a client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let gemini = GeminiClient::new(&config.llm)
            .map_err(|e| format!("Failed to create Gemini client: {e}"))?;
        tracing::info!("Gemini model: {}", config.llm.model);
        Self::with_transport(Arc::new(gemini), &config.extraction)
    }

    /// Create state around an arbitrary transport.
    ///
    /// # Errors
    /// Returns an error if the HTTP client or the suggestion pattern cannot be built.
    pub fn with_transport(
        completion: Arc<dyn CompletionTransport>,
        extraction: &ExtractionConfig,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("katagrafy-proxy/", env!("CARGO_PKG_VERSION")))
            .timeout(extraction.request_timeout);
        if extraction.allow_private_hosts {
            tracing::warn!("Fetch relay accepts private and loopback targets");
        } else {
            builder = builder
                .redirect(public_redirects())
                .dns_resolver(Arc::new(PublicOnlyResolver));
        }
        let http = builder.build()?;

        Ok(Arc::new(Self {
            completion,
            suggestions: SuggestionParser::new()?,
            http,
            max_fetch_bytes: extraction.max_download_bytes,
            allow_private_hosts: extraction.allow_private_hosts,
        }))
    }
}
