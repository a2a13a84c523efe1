//! JSON bodies exchanged with the completion proxy.

use serde::{Deserialize, Serialize};

use crate::extraction::IMAGE_MARKER;

/// Request accepted by `POST /api/gemini`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// User question or instruction.
    pub prompt: String,
    /// Whether `file_context` holds document text.
    #[serde(default)]
    pub include_file_content: bool,
    /// Whether `file_context` describes an image.
    #[serde(default)]
    pub includes_image_analysis: bool,
    /// Extracted file text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_context: Option<String>,
    /// Whether the answer must be a list of follow-up questions.
    #[serde(default)]
    pub is_suggestion_request: bool,
    /// Cache-busting key for suggestion requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Asks intermediaries not to serve a cached suggestion list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_suggestions: Option<bool>,
}

impl ProxyRequest {
    /// Build a request for `prompt`, classifying the optional context.
    #[must_use]
    pub fn new(prompt: impl Into<String>, context: Option<&str>) -> Self {
        let context = context
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string);
        let is_image = context.as_deref().is_some_and(|c| c.contains(IMAGE_MARKER));
        Self {
            prompt: prompt.into(),
            include_file_content: context.is_some() && !is_image,
            includes_image_analysis: is_image,
            file_context: context,
            ..Self::default()
        }
    }

    /// Mark this request as a suggestion request with a cache-busting key.
    #[must_use]
    pub fn for_suggestions(mut self, cache_key: impl Into<String>) -> Self {
        self.is_suggestion_request = true;
        self.cache_key = Some(cache_key.into());
        self.refresh_suggestions = Some(true);
        self
    }
}

/// Successful proxy answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResponse {
    /// Model answer text.
    pub answer: String,
}

/// Error body returned with a non-2xx status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error.
    pub error: String,
    /// Optional diagnostic payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_are_camel_case() {
        let request = ProxyRequest::new("why?", Some("some text")).for_suggestions("k1");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "why?");
        assert_eq!(json["includeFileContent"], true);
        assert_eq!(json["includesImageAnalysis"], false);
        assert_eq!(json["fileContext"], "some text");
        assert_eq!(json["isSuggestionRequest"], true);
        assert_eq!(json["cacheKey"], "k1");
        assert_eq!(json["refreshSuggestions"], true);
    }

    #[test]
    fn test_minimal_body_deserializes() {
        let request: ProxyRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(request, ProxyRequest::new("hi", None));
    }

    #[test]
    fn test_image_context_sets_image_flag() {
        let request = ProxyRequest::new("what is it?", Some("[Image: cat.png]"));
        assert!(request.includes_image_analysis);
        assert!(!request.include_file_content);
    }

    #[test]
    fn test_blank_context_is_dropped() {
        let request = ProxyRequest::new("q", Some("   "));
        assert_eq!(request.file_context, None);
        assert!(!request.include_file_content);
    }
}
