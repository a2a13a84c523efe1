//! Domain entities shared by the gateway, the orchestrator and the export.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ids::{FileId, InviteId, MessageId, SessionId, UserId, WorkspaceId};

/// Maximum characters kept in a session's last-message preview.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Marker appended to shortened titles and previews.
pub const ELLIPSIS: &str = "...";

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Preview stored on a session for its latest message.
#[must_use]
pub fn preview_of(content: &str) -> String {
    truncate_with_ellipsis(content.trim(), PREVIEW_MAX_CHARS)
}

/// A named container scoping sessions and files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Workspace identifier.
    pub id: WorkspaceId,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Owning account.
    pub owner_id: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Sent by the user.
    User,
    /// Produced by the model.
    Assistant,
}

impl MessageRole {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Capitalized label for display and export.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// One immutable message in a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Message body.
    pub content: String,
    /// Author role.
    pub role: MessageRole,
    /// Parent session.
    pub session_id: SessionId,
    /// Creation time; defines ordering within the session.
    pub created_at: DateTime<Utc>,
}

/// One conversation thread within a workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Session identifier.
    pub id: SessionId,
    /// Display title.
    pub title: String,
    /// Preview of the latest message, if any.
    pub last_message: Option<String>,
    /// Whether the user pinned this session.
    pub is_pinned: bool,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Owning account.
    pub owner_id: UserId,
    /// Last activity time.
    pub updated_at: DateTime<Utc>,
    /// Messages, empty until loaded.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Record activity from a freshly written message.
    pub fn touch(&mut self, message: &ChatMessage) {
        self.last_message = Some(preview_of(&message.content));
        self.updated_at = message.created_at;
    }
}

/// Where a workspace file's bytes live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSource {
    /// Binary persisted to blob storage under `path`.
    Stored {
        /// Blob store key.
        path: String,
    },
    /// Pseudo-file wrapping an external link.
    UrlReference {
        /// Referenced URL.
        url: String,
    },
}

/// A file or URL reference attached to a workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    /// File identifier; URL references carry the `url-` prefix.
    pub id: FileId,
    /// Display name.
    pub name: String,
    /// Size in bytes (0 for URL references).
    pub size: u64,
    /// MIME type as uploaded or guessed.
    pub mime_type: String,
    /// Retrieval URL, resolved at read time for stored files.
    pub url: String,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Uploader.
    pub owner_id: UserId,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
    /// Extracted text, once loaded.
    pub content: Option<String>,
    /// Backing storage.
    pub source: FileSource,
}

impl WorkspaceFile {
    /// Whether this file is a URL reference kept in local state only.
    #[must_use]
    pub fn is_url_reference(&self) -> bool {
        self.id.is_url_reference()
    }
}

/// Binary upload handed to the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
    /// Original file name.
    pub name: String,
    /// MIME type reported by the picker.
    pub mime_type: String,
    /// File bytes.
    pub bytes: Vec<u8>,
}

impl FileUpload {
    /// Build an upload from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Chat layout style.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStyle {
    /// Default layout.
    #[default]
    Standard,
    /// Dense layout.
    Compact,
    /// Speech-bubble layout.
    Bubble,
}

impl ChatStyle {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Compact => "compact",
            Self::Bubble => "bubble",
        }
    }
}

impl fmt::Display for ChatStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChatStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "standard" => Ok(Self::Standard),
            "compact" => Ok(Self::Compact),
            "bubble" => Ok(Self::Bubble),
            _ => Err(value.to_string()),
        }
    }
}

/// Per-user display preferences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Chat layout style.
    pub chat_style: ChatStyle,
    /// Bot avatar URL.
    pub bot_avatar: Option<String>,
}

/// State of a session-sharing invite.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    /// Waiting for the invitee.
    Pending,
    /// Invitee accepted.
    Accepted,
    /// Invitee declined.
    Rejected,
}

impl InviteStatus {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the invite still awaits an answer.
    #[must_use]
    pub const fn is_open(self) -> bool {
        match self {
            Self::Pending => true,
            Self::Accepted | Self::Rejected => false,
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(value.to_string()),
        }
    }
}

/// Invitation to join a shared session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInvite {
    /// Invite identifier.
    pub id: InviteId,
    /// Shared session.
    pub session_id: SessionId,
    /// Account that shared the session.
    pub inviter_id: UserId,
    /// Email address of the invitee.
    pub invitee_email: String,
    /// Current state.
    pub status: InviteStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("0123456789abc", 10), "0123456789...");
        assert_eq!(truncate_with_ellipsis("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_preview_trims_and_caps() {
        let long = "x".repeat(150);
        let preview = preview_of(&format!("  {long}  "));
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS + ELLIPSIS.len());
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!("assistant".parse::<MessageRole>(), Ok(MessageRole::Assistant));
        assert_eq!(MessageRole::User.label(), "User");
        assert_eq!("bubble".parse::<ChatStyle>(), Ok(ChatStyle::Bubble));
        assert!("wide".parse::<ChatStyle>().is_err());
        assert_eq!("rejected".parse::<InviteStatus>(), Ok(InviteStatus::Rejected));
        assert!(InviteStatus::Pending.is_open());
        assert!(!InviteStatus::Accepted.is_open());
    }
}
