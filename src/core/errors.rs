//! Error taxonomy for the chat core.
//!
//! Each collaborator owns one enum; [`ChatError`] is what the orchestrator
//! surfaces to callers after classifying the collaborator failure.

use std::time::Duration;

use thiserror::Error;

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// A configured URL does not parse.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Persistence gateway failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Backend credentials or location are missing.
    #[error("backend not configured: {0}")]
    AuthConfiguration(String),
    /// Referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (table).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Blob store I/O error.
    #[error("blob store error: {0}")]
    Io(#[from] std::io::Error),
    /// A stored row could not be mapped to a domain entity.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl PersistenceError {
    /// Build a `NotFound` for the given entity and id.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the failure only means the row is already gone.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience result alias for gateway operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// LLM call failures.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured for direct mode.
    #[error("no Gemini API key configured")]
    MissingApiKey,
    /// Transport failure before a response arrived.
    #[error("request to the language model failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The remote function answered with an error status.
    #[error("the language model service returned {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Error text from the service.
        message: String,
    },
    /// The model produced no text.
    #[error("the language model returned an empty answer")]
    EmptyAnswer,
    /// Response body could not be decoded.
    #[error("unexpected response from the language model: {0}")]
    InvalidResponse(String),
    /// The suggestion list pattern failed to compile.
    #[error("suggestion pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience result alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Extraction failures; absorbed inside the extractor and turned into
/// placeholder text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    /// Upstream answered with an error status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// PDF parsing error.
    #[error("PDF parsing error: {0}")]
    Pdf(#[from] lopdf::Error),
    /// Content exceeded the download limit.
    #[error("Content too large: {0} bytes")]
    TooLarge(u64),
    /// No fetch proxy is configured.
    #[error("no fetch proxy configured")]
    NoProxy,
}

/// Spreadsheet export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    /// No sessions were selected.
    #[error("there are no chats to export")]
    NothingToExport,
    /// Workbook construction failed.
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Output directory problem.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Preference store failures.
#[derive(Debug, Error)]
pub enum PreferencesError {
    /// Local storage file could not be read or written.
    #[error("local storage error: {0}")]
    Io(#[from] std::io::Error),
    /// Local storage file is not valid JSON.
    #[error("local storage is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Remote copy could not be read or written.
    #[error("remote preferences error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors surfaced at the orchestrator boundary.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Backend is not configured; authenticated flows are disabled.
    #[error("backend not configured: {0}")]
    AuthConfiguration(String),
    /// Referenced entity is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// A gateway call failed.
    #[error("could not save your changes: {0}")]
    Persistence(PersistenceError),
    /// The LLM call failed.
    #[error("could not get an answer: {0}")]
    Llm(#[from] LlmError),
    /// A remote call exceeded the configured bound.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Configured bound.
        after: Duration,
    },
    /// The user cancelled a send.
    #[error("the request was cancelled")]
    Cancelled,
    /// An operation needs an active workspace.
    #[error("select a workspace first")]
    NoActiveWorkspace,
    /// Message content was blank.
    #[error("message cannot be empty")]
    EmptyMessage,
    /// A URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// An invitee address is not an email.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    /// Export failed.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    /// Preference store failed.
    #[error("preferences error: {0}")]
    Preferences(#[from] PreferencesError),
}

impl From<PersistenceError> for ChatError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::AuthConfiguration(msg) => Self::AuthConfiguration(msg),
            PersistenceError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            other => Self::Persistence(other),
        }
    }
}

/// Convenience result alias for orchestrator operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_not_found_maps_to_chat_not_found() {
        let err: ChatError = PersistenceError::not_found("chat_sessions", "abc").into();
        assert!(matches!(err, ChatError::NotFound(ref what) if what == "chat_sessions abc"));
    }

    #[test]
    fn test_auth_configuration_is_preserved() {
        let err: ChatError =
            PersistenceError::AuthConfiguration("missing database path".to_string()).into();
        assert!(matches!(err, ChatError::AuthConfiguration(_)));
    }

    #[test]
    fn test_timeout_display() {
        let err = ChatError::Timeout {
            operation: "send message",
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "send message timed out after 30s");
    }

    #[test]
    fn test_llm_error_display_is_readable() {
        let err = LlmError::Remote {
            status: 502,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "the language model service returned 502: quota exceeded"
        );
        assert_eq!(
            ChatError::from(LlmError::EmptyAnswer).to_string(),
            "could not get an answer: the language model returned an empty answer"
        );
    }
}
