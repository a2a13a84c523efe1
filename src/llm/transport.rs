//! Completion transport through the Katagrafy proxy.

use url::Url;

use crate::core::config::LlmConfig;
use crate::core::errors::{LlmError, LlmResult};
use crate::llm::wire::{ErrorBody, ProxyRequest, ProxyResponse};
use crate::llm::{CompletionTransport, LlmFuture};

/// Route served by the proxy.
pub const GEMINI_ROUTE: &str = "/api/gemini";

/// Posts [`ProxyRequest`] bodies to `{proxy_url}/api/gemini`.
pub struct HttpProxyTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpProxyTransport {
    /// Build a transport from `config`.
    ///
    /// # Errors
    /// Returns an error if the proxy URL is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let endpoint = Url::parse(&config.proxy_url)
            .and_then(|base| base.join(GEMINI_ROUTE))
            .map_err(|err| LlmError::InvalidResponse(format!("invalid proxy url: {err}")))?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// Full endpoint URL.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl CompletionTransport for HttpProxyTransport {
    fn complete(&self, request: ProxyRequest) -> LlmFuture<'_, LlmResult<String>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint.clone())
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = match serde_json::from_str::<ErrorBody>(&text) {
                    Ok(ErrorBody {
                        error,
                        details: Some(details),
                    }) => format!("{error} ({details})"),
                    Ok(ErrorBody { error, .. }) => error,
                    Err(_) if text.trim().is_empty() => status.to_string(),
                    Err(_) => text,
                };
                return Err(LlmError::Remote {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: ProxyResponse = response
                .json()
                .await
                .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
            Ok(body.answer)
        })
    }
}
