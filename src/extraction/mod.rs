//! Best-effort text extraction from uploaded files and URL references.
//!
//! Extraction never fails: every error degrades to a descriptive placeholder
//! so the orchestrator always has something to forward to the model.

pub mod html;
pub mod kinds;
pub mod pdf;

pub use kinds::{ContentKind, IMAGE_MARKER, classify};

use serde::Serialize;
use url::Url;

use crate::core::config::ExtractionConfig;
use crate::core::errors::ExtractionError;

/// Marker appended to text cut at the character cap.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated]";

/// What to extract from.
#[derive(Clone, Debug)]
pub enum ExtractionInput {
    /// File bytes with their name and MIME type.
    Bytes {
        /// File name, used for extension sniffing and placeholders.
        name: String,
        /// Reported MIME type (may be empty).
        mime_type: String,
        /// Raw bytes.
        bytes: Vec<u8>,
    },
    /// External link to fetch.
    Url(String),
}

/// Cut `text` to exactly `max_chars` characters and append the marker.
#[must_use]
pub fn truncate_content(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text,
        Some((byte_index, _)) => {
            tracing::debug!(
                "Truncating extracted content from {} to {max_chars} characters",
                text.chars().count()
            );
            let mut out = text;
            out.truncate(byte_index);
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

#[derive(Serialize)]
struct FetchUrlRequest<'a> {
    url: &'a str,
}

struct Fetched {
    content_type: String,
    bytes: Vec<u8>,
}

/// Turns files and URLs into text for the model.
pub struct ContentExtractor {
    config: ExtractionConfig,
    client: reqwest::Client,
}

impl ContentExtractor {
    /// Create an extractor with its own HTTP client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("katagrafy/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(Self { config, client })
    }

    /// Extraction settings.
    #[must_use]
    pub const fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract text from `input`.
    ///
    /// Returns `None` only for an empty text file.
    pub async fn extract(&self, input: ExtractionInput) -> Option<String> {
        let text = match input {
            ExtractionInput::Bytes {
                name,
                mime_type,
                bytes,
            } => self.extract_bytes(&name, &mime_type, &bytes)?,
            ExtractionInput::Url(url) => self.extract_url(&url).await,
        };
        Some(truncate_content(text, self.config.max_chars))
    }

    fn extract_bytes(&self, name: &str, mime_type: &str, bytes: &[u8]) -> Option<String> {
        match classify(mime_type, name) {
            ContentKind::Text | ContentKind::Html => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                if text.is_empty() { None } else { Some(text) }
            }
            ContentKind::Pdf => Some(
                pdf::extract_pdf_text(bytes, self.config.max_pdf_pages).unwrap_or_else(|err| {
                    tracing::warn!("Failed to read PDF {name}: {err}");
                    format!("{name} could not be read as a PDF ({err}).")
                }),
            ),
            ContentKind::Image => Some(kinds::image_placeholder(name)),
            ContentKind::Unsupported => Some(kinds::unsupported_placeholder(name)),
        }
    }

    async fn extract_url(&self, url: &str) -> String {
        let via_proxy = match self.config.fetch_proxy_url.as_deref() {
            Some(proxy) => self.fetch_via_proxy(proxy, url).await,
            None => Err(ExtractionError::NoProxy),
        };
        let fetched = match via_proxy {
            Ok(fetched) => Ok(fetched),
            Err(proxy_err) => {
                tracing::debug!("Proxy fetch failed for {url}: {proxy_err}; trying direct fetch");
                self.fetch_direct(url).await
            }
        };

        match fetched {
            Ok(fetched) => self.page_text(url, &fetched),
            Err(err) => {
                tracing::warn!("Failed to fetch {url}: {err}");
                fetch_failure_message(url)
            }
        }
    }

    fn page_text(&self, url: &str, fetched: &Fetched) -> String {
        let name = display_name(url);
        match classify(&fetched.content_type, url) {
            ContentKind::Html => html::html_to_text(&String::from_utf8_lossy(&fetched.bytes)),
            _ => self
                .extract_bytes(&name, &fetched.content_type, &fetched.bytes)
                .unwrap_or_else(|| format!("{name} is empty.")),
        }
    }

    async fn fetch_via_proxy(&self, proxy: &str, url: &str) -> Result<Fetched, ExtractionError> {
        let endpoint = Url::parse(proxy)?.join("/api/fetch-url")?;
        let response = self
            .client
            .post(endpoint)
            .json(&FetchUrlRequest { url })
            .send()
            .await?;
        self.read_response(response).await
    }

    async fn fetch_direct(&self, url: &str) -> Result<Fetched, ExtractionError> {
        let parsed = Url::parse(url)?;
        let response = self.client.get(parsed).send().await?;
        self.read_response(response).await
    }

    async fn read_response(
        &self,
        mut response: reqwest::Response,
    ) -> Result<Fetched, ExtractionError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::HttpStatus(status.as_u16()));
        }

        let limit = self.config.max_download_bytes;
        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(ExtractionError::TooLarge(len));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let len = (bytes.len() + chunk.len()) as u64;
            if len > limit {
                return Err(ExtractionError::TooLarge(len));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(Fetched {
            content_type,
            bytes,
        })
    }
}

/// Last path segment of a URL, or the URL itself.
fn display_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| url.to_string())
}

fn fetch_failure_message(url: &str) -> String {
    format!(
        "Could not fetch the content of {url}. The site does not allow cross-origin (CORS) \
         requests and the server-side fetch failed as well. Download the file manually and \
         upload it to this workspace instead."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::header;
    use axum::routing::get;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(ExtractionConfig::default()).unwrap()
    }

    fn bytes(name: &str, mime: &str, data: &[u8]) -> ExtractionInput {
        ExtractionInput::Bytes {
            name: name.to_string(),
            mime_type: mime.to_string(),
            bytes: data.to_vec(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_truncation_is_exact() {
        let text = "é".repeat(50_010);
        let out = truncate_content(text, 50_000);
        let kept = out.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(kept.chars().count(), 50_000);
    }

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(truncate_content("abc".to_string(), 3), "abc");
    }

    #[tokio::test]
    async fn test_text_file_is_verbatim() {
        let out = extractor()
            .extract(bytes("notes.md", "text/markdown", b"# Title\nbody"))
            .await;
        assert_eq!(out.as_deref(), Some("# Title\nbody"));
    }

    #[tokio::test]
    async fn test_empty_text_file_is_none() {
        assert_eq!(extractor().extract(bytes("a.txt", "text/plain", b"")).await, None);
    }

    #[tokio::test]
    async fn test_long_text_is_capped() {
        let data = "x".repeat(60_000);
        let out = extractor()
            .extract(bytes("big.txt", "text/plain", data.as_bytes()))
            .await
            .unwrap();
        assert_eq!(out.len(), 50_000 + TRUNCATION_MARKER.len());
        assert!(out.ends_with("[Content truncated]"));
    }

    #[tokio::test]
    async fn test_image_and_unsupported_placeholders() {
        let ex = extractor();
        let image = ex.extract(bytes("cat.png", "image/png", &[0x89, 0x50])).await.unwrap();
        assert!(image.starts_with(IMAGE_MARKER));
        let other = ex
            .extract(bytes("data.bin", "application/octet-stream", &[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(other, "data.bin (unsupported for preview)");
    }

    #[tokio::test]
    async fn test_pdf_bytes() {
        let data = pdf::tests::sample_pdf(3);
        let out = extractor()
            .extract(bytes("doc.pdf", "application/pdf", &data))
            .await
            .unwrap();
        assert!(out.contains("Page 1:"));
        assert!(out.contains("Page 3:"));
    }

    #[tokio::test]
    async fn test_broken_pdf_degrades_to_message() {
        let out = extractor()
            .extract(bytes("doc.pdf", "application/pdf", b"%PDF-broken"))
            .await
            .unwrap();
        assert!(out.starts_with("doc.pdf could not be read as a PDF"));
    }

    #[tokio::test]
    async fn test_direct_url_fetch_reduces_html() {
        let router = Router::new().route(
            "/page",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    "<html><head><title>Doc</title></head><body><p>Hello there</p></body></html>",
                )
            }),
        );
        let base = serve(router).await;
        let out = extractor()
            .extract(ExtractionInput::Url(format!("{base}/page")))
            .await
            .unwrap();
        assert_eq!(out, "Doc\n\nHello there");
    }

    #[tokio::test]
    async fn test_unreachable_url_explains_restriction() {
        let router = Router::new().route(
            "/missing",
            get(|| async { axum::http::StatusCode::NOT_FOUND }),
        );
        let base = serve(router).await;
        let url = format!("{base}/missing");
        let ex = ContentExtractor::new(ExtractionConfig::default().with_fetch_proxy(base.clone()))
            .unwrap();
        let out = ex.extract(ExtractionInput::Url(url)).await.unwrap();
        assert!(out.contains("cross-origin"));
        assert!(out.contains("Download the file manually"));
    }

    #[tokio::test]
    async fn test_streamed_download_stops_at_limit() {
        let router = Router::new().route(
            "/stream",
            get(|| async {
                let parts = (0..4).map(|_| Ok::<_, std::io::Error>(vec![b'a'; 1000]));
                axum::body::Body::from_stream(futures::stream::iter(parts))
            }),
        );
        let base = serve(router).await;
        let url = format!("{base}/stream");
        let mut config = ExtractionConfig::default();
        config.max_download_bytes = 1024;
        let ex = ContentExtractor::new(config).unwrap();

        match ex.fetch_direct(&url).await {
            Err(ExtractionError::TooLarge(len)) => assert!(len > 1024, "{len}"),
            other => panic!("expected TooLarge, got {:?}", other.map(|f| f.bytes.len())),
        }
        let out = ex.extract(ExtractionInput::Url(url)).await.unwrap();
        assert!(out.starts_with("Could not fetch"), "{out}");
    }
}
