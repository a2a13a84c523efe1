//! Follow-up question lists.

use std::collections::HashSet;

use chrono::Utc;
use rand::Rng;
use regex::Regex;

/// Fewest parsed questions accepted from the model.
pub const MIN_SUGGESTIONS: usize = 3;
/// Most questions kept.
pub const MAX_SUGGESTIONS: usize = 6;

/// Used when the model output does not parse into enough questions.
pub const DEFAULT_SUGGESTIONS: [&str; 4] = [
    "Can you summarize the key points?",
    "What are the most important details I should know?",
    "Can you explain this in simpler terms?",
    "What should I look into next?",
];

/// Instruction sent when asking for suggestions.
pub const SUGGESTION_PROMPT: &str =
    "Suggest follow-up questions the user could ask next about this conversation.";

/// Instruction sent when asking for suggestions about file context.
pub const SUGGESTION_PROMPT_WITH_CONTEXT: &str =
    "Suggest follow-up questions the user could ask about the content below.";

/// Parses numbered or bulleted model output into a question list.
pub struct SuggestionParser {
    item: Regex,
}

impl SuggestionParser {
    /// Compile the list-item pattern.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            item: Regex::new(r"^\s*(?:\d{1,2}\s*[.):-]|[-*•])\s*(.+?)\s*$")?,
        })
    }

    /// Between 3 and 6 distinct questions, or the default list.
    #[must_use]
    pub fn parse(&self, answer: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut questions = Vec::new();

        for line in answer.lines() {
            let Some(captures) = self.item.captures(line) else {
                continue;
            };
            let Some(text) = captures.get(1) else {
                continue;
            };
            let question = text
                .as_str()
                .trim_matches(|c: char| c == '*' || c == '"' || c.is_whitespace())
                .to_string();
            if question.is_empty() || !seen.insert(question.to_lowercase()) {
                continue;
            }
            questions.push(question);
            if questions.len() == MAX_SUGGESTIONS {
                break;
            }
        }

        if questions.len() < MIN_SUGGESTIONS {
            tracing::debug!(
                "Only {} suggestions parsed, using defaults",
                questions.len()
            );
            return default_suggestions();
        }
        questions
    }
}

/// The fixed fallback list.
#[must_use]
pub fn default_suggestions() -> Vec<String> {
    DEFAULT_SUGGESTIONS.iter().map(|s| (*s).to_string()).collect()
}

/// Render questions as a numbered list.
#[must_use]
pub fn format_numbered(questions: &[String]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Timestamp-derived cache-busting key.
#[must_use]
pub fn cache_key() -> String {
    let nonce: u32 = rand::thread_rng().r#gen();
    format!("suggest-{}-{nonce:08x}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_list_is_parsed() {
        let parser = SuggestionParser::new().unwrap();
        let answer =
            "Here are some questions:\n1. What is X?\n2) How does Y work?\n3. **Why Z?**\n";
        assert_eq!(
            parser.parse(answer),
            vec!["What is X?", "How does Y work?", "Why Z?"]
        );
    }

    #[test]
    fn test_duplicates_removed_and_capped() {
        let parser = SuggestionParser::new().unwrap();
        let answer = (1..=9)
            .map(|i| format!("- Question {}?", i.min(8)))
            .collect::<Vec<_>>()
            .join("\n");
        let parsed = parser.parse(&answer);
        assert_eq!(parsed.len(), MAX_SUGGESTIONS);
        assert_eq!(parsed[0], "Question 1?");
    }

    #[test]
    fn test_unparseable_answer_falls_back() {
        let parser = SuggestionParser::new().unwrap();
        assert_eq!(parser.parse("Sure! Ask me anything."), default_suggestions());
        assert_eq!(parser.parse("1. Only one?\n2. only ONE?"), default_suggestions());
    }

    #[test]
    fn test_format_numbered_round_trips() {
        let parser = SuggestionParser::new().unwrap();
        let questions = vec!["A?".to_string(), "B?".to_string(), "C?".to_string()];
        assert_eq!(format_numbered(&questions), "1. A?\n2. B?\n3. C?");
        assert_eq!(parser.parse(&format_numbered(&questions)), questions);
    }

    #[test]
    fn test_cache_keys_differ() {
        let a = cache_key();
        assert!(a.starts_with("suggest-"));
        assert_ne!(a, cache_key());
    }
}
