//! Persistence gateway over workspaces, sessions, messages and files.
//!
//! The gateway is the only component that talks to the backend store. Every
//! call round-trips; nothing is cached.

pub mod blob;
pub mod sqlite;

pub use blob::{BlobStore, FsBlobStore};
pub use sqlite::SqlitePersistence;

use std::future::Future;
use std::pin::Pin;

use crate::core::errors::PersistenceResult;
use crate::core::ids::{FileId, InviteId, MessageId, SessionId, UserId, WorkspaceId};
use crate::core::models::{
    ChatMessage, ChatSession, FileUpload, InviteStatus, MessageRole, SessionInvite,
    UserPreferences, Workspace, WorkspaceFile,
};

/// Boxed future type for gateway operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Typed CRUD over the backend store.
pub trait PersistenceGateway: Send + Sync {
    /// List workspaces owned by `owner`, oldest first.
    fn list_workspaces(&self, owner: UserId) -> StoreFuture<'_, PersistenceResult<Vec<Workspace>>>;

    /// Create a workspace.
    fn create_workspace(
        &self,
        owner: UserId,
        name: &str,
        description: Option<&str>,
    ) -> StoreFuture<'_, PersistenceResult<Workspace>>;

    /// Rename a workspace and replace its description.
    fn update_workspace(
        &self,
        id: WorkspaceId,
        name: &str,
        description: Option<&str>,
    ) -> StoreFuture<'_, PersistenceResult<Workspace>>;

    /// Delete a workspace together with its sessions, messages and files.
    fn delete_workspace(&self, id: WorkspaceId) -> StoreFuture<'_, PersistenceResult<()>>;

    /// List sessions of a workspace, pinned first then most recent.
    fn list_sessions(
        &self,
        workspace: WorkspaceId,
    ) -> StoreFuture<'_, PersistenceResult<Vec<ChatSession>>>;

    /// Create an empty session.
    fn create_session(
        &self,
        workspace: WorkspaceId,
        owner: UserId,
        title: &str,
    ) -> StoreFuture<'_, PersistenceResult<ChatSession>>;

    /// Change a session title.
    fn rename_session(&self, id: SessionId, title: &str) -> StoreFuture<'_, PersistenceResult<()>>;

    /// Set the pinned flag.
    fn set_session_pinned(
        &self,
        id: SessionId,
        pinned: bool,
    ) -> StoreFuture<'_, PersistenceResult<()>>;

    /// Delete a session and its messages.
    fn delete_session(&self, id: SessionId) -> StoreFuture<'_, PersistenceResult<()>>;

    /// List messages of a session, oldest first.
    fn list_messages(
        &self,
        session: SessionId,
    ) -> StoreFuture<'_, PersistenceResult<Vec<ChatMessage>>>;

    /// Append a message and refresh the session preview and activity time.
    fn create_message(
        &self,
        session: SessionId,
        role: MessageRole,
        content: &str,
    ) -> StoreFuture<'_, PersistenceResult<ChatMessage>>;

    /// Delete a message and refresh the session preview.
    fn delete_message(&self, id: MessageId) -> StoreFuture<'_, PersistenceResult<()>>;

    /// List stored files of a workspace, newest first.
    fn list_files(
        &self,
        workspace: WorkspaceId,
    ) -> StoreFuture<'_, PersistenceResult<Vec<WorkspaceFile>>>;

    /// Store the blob and its record.
    fn upload_file(
        &self,
        workspace: WorkspaceId,
        owner: UserId,
        upload: FileUpload,
    ) -> StoreFuture<'_, PersistenceResult<WorkspaceFile>>;

    /// Delete a stored file's record and blob.
    fn delete_file(&self, id: &FileId) -> StoreFuture<'_, PersistenceResult<()>>;

    /// Read the blob behind a stored file.
    fn read_file_bytes(&self, file: &WorkspaceFile) -> StoreFuture<'_, PersistenceResult<Vec<u8>>>;

    /// Remote copy of a user's preferences, if any.
    fn load_preferences(
        &self,
        owner: UserId,
    ) -> StoreFuture<'_, PersistenceResult<Option<UserPreferences>>>;

    /// Replace the remote copy of a user's preferences.
    fn save_preferences(
        &self,
        owner: UserId,
        preferences: &UserPreferences,
    ) -> StoreFuture<'_, PersistenceResult<()>>;

    /// Record a pending invite to a session.
    fn create_invite(
        &self,
        session: SessionId,
        inviter: UserId,
        invitee_email: &str,
    ) -> StoreFuture<'_, PersistenceResult<SessionInvite>>;

    /// Invites addressed to `invitee_email`, newest first.
    fn list_invites_for(
        &self,
        invitee_email: &str,
    ) -> StoreFuture<'_, PersistenceResult<Vec<SessionInvite>>>;

    /// Move an invite to `status`.
    fn set_invite_status(
        &self,
        id: InviteId,
        status: InviteStatus,
    ) -> StoreFuture<'_, PersistenceResult<SessionInvite>>;
}
