//! LLM client: prompt framing, suggestion lists and completion transports.

pub mod gemini;
pub mod prompt;
pub mod suggestions;
pub mod transport;
pub mod wire;

pub use gemini::GeminiClient;
pub use suggestions::SuggestionParser;
pub use transport::HttpProxyTransport;
pub use wire::{ErrorBody, ProxyRequest, ProxyResponse};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::config::LlmConfig;
use crate::core::errors::{LlmError, LlmResult};
use crate::extraction::truncate_content;

/// Boxed future type for completion calls.
pub type LlmFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default cap on forwarded context, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 50_000;

/// Sends one completion request and returns the raw answer text.
pub trait CompletionTransport: Send + Sync {
    /// Complete `request`.
    fn complete(&self, request: ProxyRequest) -> LlmFuture<'_, LlmResult<String>>;
}

/// High-level client used by the orchestrator.
pub struct LlmClient {
    transport: Arc<dyn CompletionTransport>,
    suggestions: SuggestionParser,
    max_context_chars: usize,
}

impl LlmClient {
    /// Wrap a transport.
    ///
    /// # Errors
    /// Returns an error if the suggestion pattern fails to compile.
    pub fn new(transport: Arc<dyn CompletionTransport>) -> LlmResult<Self> {
        Ok(Self {
            transport,
            suggestions: SuggestionParser::new()?,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        })
    }

    /// Direct Gemini calls when an API key is configured, the proxy otherwise.
    ///
    /// # Errors
    /// Returns an error if the transport cannot be built.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        let has_key = config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        let transport: Arc<dyn CompletionTransport> = if has_key {
            tracing::info!("Using direct Gemini access with a stored API key");
            Arc::new(GeminiClient::new(config)?)
        } else {
            Arc::new(HttpProxyTransport::new(config)?)
        };
        Self::new(transport)
    }

    /// Set the context cap.
    #[must_use]
    pub const fn with_max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars;
        self
    }

    /// Answer `prompt`, grounded on `context` when given.
    ///
    /// # Errors
    /// Returns an error if the call fails or the answer is empty.
    pub async fn ask(&self, prompt: &str, context: Option<&str>) -> LlmResult<String> {
        let context = self.cap_context(context);
        let request = ProxyRequest::new(prompt, context.as_deref());
        let answer = self.transport.complete(request).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(LlmError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }

    /// Between 3 and 6 follow-up questions for the conversation or `context`.
    ///
    /// # Errors
    /// Returns an error if the call fails or the answer is empty.
    pub async fn suggest_questions(&self, context: Option<&str>) -> LlmResult<Vec<String>> {
        let context = self.cap_context(context);
        let prompt = if context.is_some() {
            suggestions::SUGGESTION_PROMPT_WITH_CONTEXT
        } else {
            suggestions::SUGGESTION_PROMPT
        };
        let request = ProxyRequest::new(prompt, context.as_deref())
            .for_suggestions(suggestions::cache_key());
        let answer = self.transport.complete(request).await?;
        if answer.trim().is_empty() {
            return Err(LlmError::EmptyAnswer);
        }
        Ok(self.suggestions.parse(&answer))
    }

    fn cap_context(&self, context: Option<&str>) -> Option<String> {
        let context = context.filter(|c| !c.trim().is_empty())?;
        tracing::debug!("LLM context length: {} chars", context.chars().count());
        Some(truncate_content(context.to_string(), self.max_context_chars))
    }
}
