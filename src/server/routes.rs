//! HTTP route handlers for the Katagrafy proxy.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use url::Url;

use crate::core::errors::LlmError;
use crate::llm::suggestions::format_numbered;
use crate::llm::transport::GEMINI_ROUTE;
use crate::llm::wire::{ErrorBody, ProxyRequest, ProxyResponse};

use super::guard;
use super::state::AppState;

/// Route relaying URL fetches.
pub const FETCH_URL_ROUTE: &str = "/api/fetch-url";

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(
    status: StatusCode,
    error: impl Into<String>,
    details: Option<serde_json::Value>,
) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            details,
        }),
    )
}

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(GEMINI_ROUTE, post(gemini_completion))
        .route(FETCH_URL_ROUTE, post(fetch_url))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "katagrafy-proxy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Relay a completion request to the model.
async fn gemini_completion(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProxyRequest>,
) -> Result<Json<ProxyResponse>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Prompt is required", None));
    }

    let is_suggestion = request.is_suggestion_request;
    tracing::debug!(
        "Completion request: prompt_len={}, context_len={}, suggestion={is_suggestion}",
        request.prompt.len(),
        request.file_context.as_deref().map_or(0, str::len)
    );

    let answer = state.completion.complete(request).await.map_err(|err| {
        tracing::warn!("Completion failed: {err}");
        match err {
            LlmError::Remote { status, message } => api_error(
                StatusCode::BAD_GATEWAY,
                "Failed to get a response from Gemini",
                Some(serde_json::json!({ "status": status, "message": message })),
            ),
            LlmError::EmptyAnswer => api_error(
                StatusCode::BAD_GATEWAY,
                "Gemini returned an empty answer",
                None,
            ),
            other => api_error(
                StatusCode::BAD_GATEWAY,
                "Failed to get a response from Gemini",
                Some(serde_json::Value::String(other.to_string())),
            ),
        }
    })?;

    let answer = if is_suggestion {
        format_numbered(&state.suggestions.parse(&answer))
    } else {
        answer
    };
    Ok(Json(ProxyResponse { answer }))
}

/// Body of `POST /api/fetch-url`.
#[derive(Debug, Deserialize)]
pub struct FetchUrlRequest {
    /// Absolute http(s) URL to fetch.
    pub url: String,
}

/// Fetch a URL server-side and relay the bytes with the upstream content type.
///
/// Non-public targets are refused unless the state allows private hosts. The
/// body is read chunk by chunk and abandoned once it passes the size limit.
async fn fetch_url(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FetchUrlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || api_error(StatusCode::BAD_REQUEST, "A valid http(s) URL is required", None);
    let url = Url::parse(request.url.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .ok_or_else(invalid)?;

    if !state.allow_private_hosts {
        guard::check_target(&url).await.map_err(|reason| {
            tracing::warn!("Refused fetch of {url}: {reason}");
            api_error(
                StatusCode::BAD_REQUEST,
                "Target address is not allowed",
                Some(serde_json::Value::String(reason)),
            )
        })?;
    }

    let mut response = state.http.get(url.clone()).send().await.map_err(|err| {
        tracing::warn!("Fetch of {url} failed: {err}");
        api_error(
            StatusCode::BAD_GATEWAY,
            "Failed to fetch the URL",
            Some(serde_json::Value::String(err.to_string())),
        )
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(api_error(
            StatusCode::BAD_GATEWAY,
            "Upstream returned an error status",
            Some(serde_json::json!({ "status": status.as_u16() })),
        ));
    }

    let too_large = || api_error(StatusCode::PAYLOAD_TOO_LARGE, "Content too large", None);
    if response
        .content_length()
        .is_some_and(|len| len > state.max_fetch_bytes)
    {
        return Err(too_large());
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut body = Vec::new();
    loop {
        let chunk = response.chunk().await.map_err(|err| {
            api_error(
                StatusCode::BAD_GATEWAY,
                "Failed to read the upstream body",
                Some(serde_json::Value::String(err.to_string())),
            )
        })?;
        let Some(chunk) = chunk else { break };
        if (body.len() + chunk.len()) as u64 > state.max_fetch_bytes {
            tracing::warn!("Fetch of {url} exceeded {} bytes", state.max_fetch_bytes);
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    Ok(([(header::CONTENT_TYPE, content_type)], body))
}
