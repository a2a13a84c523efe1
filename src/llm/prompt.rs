//! Prompt framing from a proxy request.

use crate::llm::wire::ProxyRequest;

/// Framing used when the context describes an image.
pub const IMAGE_FRAMING: &str = "Analyze the following image information and answer the question.";

/// Framing used for document context.
pub const CONTENT_FRAMING: &str =
    "Analyze the following content and answer the question based on it.";

/// Appended to suggestion requests.
pub const SUGGESTION_INSTRUCTION: &str = "\n\nRespond ONLY with a numbered list of 3 to 6 \
     distinct follow-up questions, one per line, formatted as \"1. Question\". Do not add any \
     introduction, explanation or closing sentence.";

/// Final prompt text sent to the model.
#[must_use]
pub fn build_prompt(request: &ProxyRequest) -> String {
    let context = request
        .file_context
        .as_deref()
        .filter(|c| !c.trim().is_empty());

    let mut prompt = match context {
        None => request.prompt.clone(),
        Some(context) if request.includes_image_analysis => format!(
            "{IMAGE_FRAMING}\n\nImage information:\n{context}\n\nQuestion: {}",
            request.prompt
        ),
        Some(context) => format!(
            "{CONTENT_FRAMING}\n\nContent:\n{context}\n\nQuestion: {}",
            request.prompt
        ),
    };

    if request.is_suggestion_request {
        prompt.push_str(SUGGESTION_INSTRUCTION);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_prompt_is_forwarded_unmodified() {
        let request = ProxyRequest::new("Hello there", None);
        assert_eq!(build_prompt(&request), "Hello there");
    }

    #[test]
    fn test_document_framing() {
        let request = ProxyRequest::new("What is the total?", Some("Invoice: 42 EUR"));
        assert_eq!(
            build_prompt(&request),
            format!(
                "{CONTENT_FRAMING}\n\nContent:\nInvoice: 42 EUR\n\n\
                 Question: What is the total?"
            )
        );
    }

    #[test]
    fn test_image_framing() {
        let request = ProxyRequest::new("Describe it", Some("[Image: cat.png]"));
        assert!(build_prompt(&request).starts_with(IMAGE_FRAMING));
    }

    #[test]
    fn test_suggestion_instruction_is_appended() {
        let request = ProxyRequest::new("Suggest questions", None).for_suggestions("k");
        let prompt = build_prompt(&request);
        assert!(prompt.starts_with("Suggest questions"));
        assert!(prompt.ends_with(SUGGESTION_INSTRUCTION));
    }
}
