//! Core types: configuration, errors, identifiers and domain entities.

pub mod config;
pub mod errors;
pub mod ids;
pub mod models;

pub use config::{
    AppConfig, BackendConfig, ChatConfig, ExportConfig, ExtractionConfig, LlmConfig, ServerConfig,
};
pub use errors::{
    ChatError, ChatResult, ConfigError, ExportError, ExtractionError, LlmError, LlmResult,
    PersistenceError, PersistenceResult, PreferencesError,
};
pub use ids::{FileId, InviteId, MessageId, SessionId, UserId, WorkspaceId};
pub use models::{
    ChatMessage, ChatSession, ChatStyle, FileSource, FileUpload, InviteStatus, MessageRole,
    SessionInvite, UserPreferences, Workspace, WorkspaceFile,
};
