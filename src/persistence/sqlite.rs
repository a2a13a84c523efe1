//! `SQLite` implementation of the persistence gateway.
//!
//! Rows are read as raw tuples inside the connection thread and mapped to
//! domain entities afterwards, so mapping failures surface as
//! [`PersistenceError::InvalidRow`] instead of opaque driver errors.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use rusqlite::types::Value;
use tokio_rusqlite::Connection;

use crate::core::config::BackendConfig;
use crate::core::errors::{PersistenceError, PersistenceResult};
use crate::core::ids::{FileId, InviteId, MessageId, SessionId, UserId, WorkspaceId};
use crate::core::models::{
    ChatMessage, ChatSession, ChatStyle, FileSource, FileUpload, InviteStatus, MessageRole,
    SessionInvite, UserPreferences, Workspace, WorkspaceFile, preview_of,
};
use crate::persistence::blob::{BlobStore, FsBlobStore};
use crate::persistence::{PersistenceGateway, StoreFuture};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS workspaces (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        user_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_workspaces_user ON workspaces (user_id, created_at);

    CREATE TABLE IF NOT EXISTS chat_sessions (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        last_message TEXT,
        is_pinned INTEGER NOT NULL DEFAULT 0,
        workspace_id TEXT NOT NULL REFERENCES workspaces (id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_chat_sessions_workspace
        ON chat_sessions (workspace_id, is_pinned DESC, updated_at DESC);

    CREATE TABLE IF NOT EXISTS chat_messages (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        role TEXT NOT NULL,
        session_id TEXT NOT NULL REFERENCES chat_sessions (id) ON DELETE CASCADE,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_chat_messages_session
        ON chat_messages (session_id, created_at);

    CREATE TABLE IF NOT EXISTS files (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        path TEXT NOT NULL,
        type TEXT NOT NULL,
        size NOT NULL,
        user_id TEXT NOT NULL,
        workspace_id TEXT NOT NULL REFERENCES workspaces (id) ON DELETE CASCADE,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_files_workspace ON files (workspace_id, created_at DESC);

    CREATE TABLE IF NOT EXISTS user_preferences (
        user_id TEXT PRIMARY KEY,
        chat_style TEXT NOT NULL,
        bot_avatar TEXT,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS session_invites (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES chat_sessions (id) ON DELETE CASCADE,
        inviter_id TEXT NOT NULL,
        invitee_email TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_session_invites_email
        ON session_invites (invitee_email, created_at DESC);
";

type WorkspaceRow = (WorkspaceId, String, Option<String>, UserId, i64, i64);
type SessionRow = (SessionId, String, Option<String>, bool, WorkspaceId, UserId, i64);
type MessageRow = (MessageId, String, String, SessionId, i64);
type FileRow = (FileId, String, String, String, Value, UserId, WorkspaceId, i64);
type InviteRow = (InviteId, SessionId, UserId, String, String, i64, i64);

const SESSION_COLUMNS: &str =
    "id, title, last_message, is_pinned, workspace_id, user_id, updated_at";
const FILE_COLUMNS: &str = "id, name, path, type, size, user_id, workspace_id, created_at";
const INVITE_COLUMNS: &str =
    "id, session_id, inviter_id, invitee_email, status, created_at, updated_at";

/// `SQLite` gateway with a pluggable blob store.
pub struct SqlitePersistence {
    conn: Connection,
    blobs: Arc<dyn BlobStore>,
}

impl SqlitePersistence {
    /// Open the backend described by `config`.
    ///
    /// # Errors
    /// Returns [`PersistenceError::AuthConfiguration`] when the database path
    /// or blob directory is missing, or a storage error if opening fails.
    pub async fn connect(config: &BackendConfig) -> PersistenceResult<Self> {
        let sqlite_path = config.sqlite_path.as_ref().ok_or_else(|| {
            PersistenceError::AuthConfiguration("database path is not set".to_string())
        })?;
        let blob_dir = config.blob_dir.as_ref().ok_or_else(|| {
            PersistenceError::AuthConfiguration("blob directory is not set".to_string())
        })?;

        let blobs = FsBlobStore::new(blob_dir, config.public_base_url.clone()).await?;
        Self::open(sqlite_path, Arc::new(blobs)).await
    }

    /// Open (or create) a database file.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(
        path: impl AsRef<Path>,
        blobs: Arc<dyn BlobStore>,
    ) -> PersistenceResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init(conn, blobs).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory(blobs: Arc<dyn BlobStore>) -> PersistenceResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, blobs).await
    }

    async fn init(conn: Connection, blobs: Arc<dyn BlobStore>) -> PersistenceResult<Self> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, blobs })
    }

    /// Run raw SQL against the store.
    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &'static str) -> PersistenceResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    fn map_file(&self, row: FileRow) -> PersistenceResult<WorkspaceFile> {
        let (id, name, path, mime_type, size, owner_id, workspace_id, created_at) = row;
        Ok(WorkspaceFile {
            url: self.blobs.public_url(&path),
            id,
            name,
            size: size_from_value(&size)?,
            mime_type,
            workspace_id,
            owner_id,
            uploaded_at: from_millis(created_at)?,
            content: None,
            source: FileSource::Stored { path },
        })
    }
}

fn from_millis(ts: i64) -> PersistenceResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| PersistenceError::InvalidRow(format!("invalid timestamp: {ts}")))
}

/// Byte counts arrive as integers, reals or numeric text depending on who
/// wrote the row.
fn size_from_value(value: &Value) -> PersistenceResult<u64> {
    let invalid = || PersistenceError::InvalidRow(format!("invalid file size: {value:?}"));
    match value {
        Value::Integer(n) => u64::try_from(*n).map_err(|_| invalid()),
        Value::Real(f) if f.is_finite() && *f >= 0.0 => Ok(f.round() as u64),
        Value::Text(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<u64>()
                .or_else(|_| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f.round() as u64)
                        .ok_or(())
                })
                .map_err(|()| invalid())
        }
        Value::Null => Ok(0),
        _ => Err(invalid()),
    }
}

fn map_workspace(row: WorkspaceRow) -> PersistenceResult<Workspace> {
    let (id, name, description, owner_id, created_at, updated_at) = row;
    Ok(Workspace {
        id,
        name,
        description,
        owner_id,
        created_at: from_millis(created_at)?,
        updated_at: from_millis(updated_at)?,
    })
}

fn map_session(row: SessionRow) -> PersistenceResult<ChatSession> {
    let (id, title, last_message, is_pinned, workspace_id, owner_id, updated_at) = row;
    Ok(ChatSession {
        id,
        title,
        last_message,
        is_pinned,
        workspace_id,
        owner_id,
        updated_at: from_millis(updated_at)?,
        messages: Vec::new(),
    })
}

fn map_message(row: MessageRow) -> PersistenceResult<ChatMessage> {
    let (id, content, role, session_id, created_at) = row;
    let role = MessageRole::from_str(&role)
        .map_err(|err| PersistenceError::InvalidRow(format!("invalid role: {err}")))?;
    Ok(ChatMessage {
        id,
        content,
        role,
        session_id,
        created_at: from_millis(created_at)?,
    })
}

fn map_invite(row: InviteRow) -> PersistenceResult<SessionInvite> {
    let (id, session_id, inviter_id, invitee_email, status, created_at, updated_at) = row;
    let status = InviteStatus::from_str(&status)
        .map_err(|err| PersistenceError::InvalidRow(format!("invalid invite status: {err}")))?;
    Ok(SessionInvite {
        id,
        session_id,
        inviter_id,
        invitee_email,
        status,
        created_at: from_millis(created_at)?,
        updated_at: from_millis(updated_at)?,
    })
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn invite_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InviteRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Blob key for an upload: `<workspace>/<file id>/<sanitized name>`.
fn blob_path(workspace: WorkspaceId, id: &FileId, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_start_matches('.');
    let safe = if safe.is_empty() { "file" } else { safe };
    format!("{workspace}/{id}/{safe}")
}

impl PersistenceGateway for SqlitePersistence {
    fn list_workspaces(&self, owner: UserId) -> StoreFuture<'_, PersistenceResult<Vec<Workspace>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, name, description, user_id, created_at, updated_at
                         FROM workspaces
                         WHERE user_id = ?1
                         ORDER BY created_at ASC, rowid ASC",
                    )?;
                    let rows = stmt
                        .query_map(rusqlite::params![owner], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                            ))
                        })?
                        .collect::<Result<Vec<WorkspaceRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(map_workspace).collect()
        })
    }

    fn create_workspace(
        &self,
        owner: UserId,
        name: &str,
        description: Option<&str>,
    ) -> StoreFuture<'_, PersistenceResult<Workspace>> {
        let name = name.trim().to_string();
        let description = description.map(str::to_string);
        Box::pin(async move {
            let now = Utc::now();
            let workspace = Workspace {
                id: WorkspaceId::new(),
                name,
                description,
                owner_id: owner,
                created_at: now,
                updated_at: now,
            };
            let row = workspace.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO workspaces
                             (id, name, description, user_id, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        rusqlite::params![
                            row.id,
                            row.name,
                            row.description,
                            row.owner_id,
                            row.created_at.timestamp_millis(),
                            row.updated_at.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(workspace)
        })
    }

    fn update_workspace(
        &self,
        id: WorkspaceId,
        name: &str,
        description: Option<&str>,
    ) -> StoreFuture<'_, PersistenceResult<Workspace>> {
        let name = name.trim().to_string();
        let description = description.map(str::to_string);
        Box::pin(async move {
            let now_ms = Utc::now().timestamp_millis();
            let row = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        "UPDATE workspaces SET name = ?1, description = ?2, updated_at = ?3
                         WHERE id = ?4",
                        rusqlite::params![name, description, now_ms, id],
                    )?;
                    if changed == 0 {
                        return Ok(None);
                    }
                    let row: Option<WorkspaceRow> = conn
                        .query_row(
                            "SELECT id, name, description, user_id, created_at, updated_at
                             FROM workspaces WHERE id = ?1",
                            rusqlite::params![id],
                            |row| {
                                Ok((
                                    row.get(0)?,
                                    row.get(1)?,
                                    row.get(2)?,
                                    row.get(3)?,
                                    row.get(4)?,
                                    row.get(5)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            let row = row.ok_or_else(|| PersistenceError::not_found("workspaces", id))?;
            map_workspace(row)
        })
    }

    fn delete_workspace(&self, id: WorkspaceId) -> StoreFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let paths = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare("SELECT path FROM files WHERE workspace_id = ?1")?;
                    let paths = stmt
                        .query_map(rusqlite::params![id], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    let deleted = conn.execute(
                        "DELETE FROM workspaces WHERE id = ?1",
                        rusqlite::params![id],
                    )?;
                    Ok((deleted > 0).then_some(paths))
                })
                .await?
                .ok_or_else(|| PersistenceError::not_found("workspaces", id))?;

            for path in paths {
                if let Err(err) = self.blobs.delete(&path).await {
                    tracing::warn!("Failed to delete blob {path} of workspace {id}: {err}");
                }
            }
            Ok(())
        })
    }

    fn list_sessions(
        &self,
        workspace: WorkspaceId,
    ) -> StoreFuture<'_, PersistenceResult<Vec<ChatSession>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS}
                         FROM chat_sessions
                         WHERE workspace_id = ?1
                         ORDER BY is_pinned DESC, updated_at DESC, rowid DESC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![workspace], session_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(map_session).collect()
        })
    }

    fn create_session(
        &self,
        workspace: WorkspaceId,
        owner: UserId,
        title: &str,
    ) -> StoreFuture<'_, PersistenceResult<ChatSession>> {
        let title = title.to_string();
        Box::pin(async move {
            let session = ChatSession {
                id: SessionId::new(),
                title,
                last_message: None,
                is_pinned: false,
                workspace_id: workspace,
                owner_id: owner,
                updated_at: Utc::now(),
                messages: Vec::new(),
            };
            let (id, title, updated_ms) = (
                session.id,
                session.title.clone(),
                session.updated_at.timestamp_millis(),
            );
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO chat_sessions ({SESSION_COLUMNS})
                             VALUES (?1, ?2, NULL, 0, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![id, title, workspace, owner, updated_ms],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(session)
        })
    }

    fn rename_session(&self, id: SessionId, title: &str) -> StoreFuture<'_, PersistenceResult<()>> {
        let title = title.to_string();
        Box::pin(async move {
            let changed = self
                .conn
                .call(move |conn| {
                    Ok(conn.execute(
                        "UPDATE chat_sessions SET title = ?1 WHERE id = ?2",
                        rusqlite::params![title, id],
                    )?)
                })
                .await?;
            if changed == 0 {
                return Err(PersistenceError::not_found("chat_sessions", id));
            }
            Ok(())
        })
    }

    fn set_session_pinned(
        &self,
        id: SessionId,
        pinned: bool,
    ) -> StoreFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let changed = self
                .conn
                .call(move |conn| {
                    Ok(conn.execute(
                        "UPDATE chat_sessions SET is_pinned = ?1 WHERE id = ?2",
                        rusqlite::params![pinned, id],
                    )?)
                })
                .await?;
            if changed == 0 {
                return Err(PersistenceError::not_found("chat_sessions", id));
            }
            Ok(())
        })
    }

    fn delete_session(&self, id: SessionId) -> StoreFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let changed = self
                .conn
                .call(move |conn| {
                    Ok(conn.execute(
                        "DELETE FROM chat_sessions WHERE id = ?1",
                        rusqlite::params![id],
                    )?)
                })
                .await?;
            if changed == 0 {
                return Err(PersistenceError::not_found("chat_sessions", id));
            }
            Ok(())
        })
    }

    fn list_messages(
        &self,
        session: SessionId,
    ) -> StoreFuture<'_, PersistenceResult<Vec<ChatMessage>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, content, role, session_id, created_at
                         FROM chat_messages
                         WHERE session_id = ?1
                         ORDER BY created_at ASC, rowid ASC",
                    )?;
                    let rows = stmt
                        .query_map(rusqlite::params![session], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(map_message).collect()
        })
    }

    fn create_message(
        &self,
        session: SessionId,
        role: MessageRole,
        content: &str,
    ) -> StoreFuture<'_, PersistenceResult<ChatMessage>> {
        let content = content.to_string();
        Box::pin(async move {
            let message = ChatMessage {
                id: MessageId::new(),
                content,
                role,
                session_id: session,
                created_at: Utc::now(),
            };
            let id = message.id;
            let body = message.content.clone();
            let preview = preview_of(&message.content);
            let created_ms = message.created_at.timestamp_millis();

            // Two writes: the message, then the session preview. Not atomic.
            let inserted = self
                .conn
                .call(move |conn| {
                    let exists: Option<i64> = conn
                        .query_row(
                            "SELECT 1 FROM chat_sessions WHERE id = ?1",
                            rusqlite::params![session],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if exists.is_none() {
                        return Ok(false);
                    }
                    conn.execute(
                        "INSERT INTO chat_messages (id, content, role, session_id, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![id, body, role.as_str(), session, created_ms],
                    )?;
                    conn.execute(
                        "UPDATE chat_sessions SET last_message = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![preview, created_ms, session],
                    )?;
                    Ok(true)
                })
                .await?;

            if !inserted {
                return Err(PersistenceError::not_found("chat_sessions", session));
            }
            Ok(message)
        })
    }

    fn delete_message(&self, id: MessageId) -> StoreFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let now_ms = Utc::now().timestamp_millis();
            let deleted = self
                .conn
                .call(move |conn| {
                    let session: Option<SessionId> = conn
                        .query_row(
                            "SELECT session_id FROM chat_messages WHERE id = ?1",
                            rusqlite::params![id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    let Some(session) = session else {
                        return Ok(false);
                    };
                    conn.execute(
                        "DELETE FROM chat_messages WHERE id = ?1",
                        rusqlite::params![id],
                    )?;
                    let latest: Option<String> = conn
                        .query_row(
                            "SELECT content FROM chat_messages WHERE session_id = ?1
                             ORDER BY created_at DESC, rowid DESC LIMIT 1",
                            rusqlite::params![session],
                            |row| row.get(0),
                        )
                        .optional()?;
                    let preview = latest.as_deref().map(preview_of);
                    conn.execute(
                        "UPDATE chat_sessions SET last_message = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![preview, now_ms, session],
                    )?;
                    Ok(true)
                })
                .await?;

            if !deleted {
                return Err(PersistenceError::not_found("chat_messages", id));
            }
            Ok(())
        })
    }

    fn list_files(
        &self,
        workspace: WorkspaceId,
    ) -> StoreFuture<'_, PersistenceResult<Vec<WorkspaceFile>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {FILE_COLUMNS}
                         FROM files
                         WHERE workspace_id = ?1
                         ORDER BY created_at DESC, rowid DESC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![workspace], file_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(|row| self.map_file(row)).collect()
        })
    }

    fn upload_file(
        &self,
        workspace: WorkspaceId,
        owner: UserId,
        upload: FileUpload,
    ) -> StoreFuture<'_, PersistenceResult<WorkspaceFile>> {
        Box::pin(async move {
            let id = FileId::stored();
            let path = blob_path(workspace, &id, &upload.name);
            let size = u64::try_from(upload.bytes.len())
                .map_err(|_| PersistenceError::InvalidRow("file too large".to_string()))?;
            let size_sql = i64::try_from(size)
                .map_err(|_| PersistenceError::InvalidRow("file too large".to_string()))?;
            let uploaded_at = Utc::now();

            self.blobs.put(&path, upload.bytes).await?;

            let record = (
                id.clone(),
                upload.name.clone(),
                path.clone(),
                upload.mime_type.clone(),
            );
            let created_ms = uploaded_at.timestamp_millis();
            let inserted = self
                .conn
                .call(move |conn| {
                    let (id, name, path, mime_type) = record;
                    conn.execute(
                        &format!(
                            "INSERT INTO files ({FILE_COLUMNS})
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                        ),
                        rusqlite::params![
                            id, name, path, mime_type, size_sql, owner, workspace, created_ms
                        ],
                    )?;
                    Ok(())
                })
                .await;

            if let Err(err) = inserted {
                if let Err(cleanup) = self.blobs.delete(&path).await {
                    tracing::warn!("Failed to remove orphaned blob {path}: {cleanup}");
                }
                return Err(err.into());
            }

            Ok(WorkspaceFile {
                url: self.blobs.public_url(&path),
                id,
                name: upload.name,
                size,
                mime_type: upload.mime_type,
                workspace_id: workspace,
                owner_id: owner,
                uploaded_at,
                content: None,
                source: FileSource::Stored { path },
            })
        })
    }

    fn delete_file(&self, id: &FileId) -> StoreFuture<'_, PersistenceResult<()>> {
        let id = id.clone();
        Box::pin(async move {
            if id.is_url_reference() {
                return Err(PersistenceError::not_found("files", id));
            }
            let key = id.clone();
            let path = self
                .conn
                .call(move |conn| {
                    let path: Option<String> = conn
                        .query_row(
                            "SELECT path FROM files WHERE id = ?1",
                            rusqlite::params![key],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if path.is_some() {
                        conn.execute("DELETE FROM files WHERE id = ?1", rusqlite::params![key])?;
                    }
                    Ok(path)
                })
                .await?
                .ok_or_else(|| PersistenceError::not_found("files", &id))?;

            self.blobs.delete(&path).await
        })
    }

    fn read_file_bytes(&self, file: &WorkspaceFile) -> StoreFuture<'_, PersistenceResult<Vec<u8>>> {
        let source = file.source.clone();
        Box::pin(async move {
            match source {
                FileSource::Stored { path } => self.blobs.get(&path).await,
                FileSource::UrlReference { url } => Err(PersistenceError::InvalidRow(format!(
                    "url reference has no stored bytes: {url}"
                ))),
            }
        })
    }

    fn load_preferences(
        &self,
        owner: UserId,
    ) -> StoreFuture<'_, PersistenceResult<Option<UserPreferences>>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT chat_style, bot_avatar FROM user_preferences
                             WHERE user_id = ?1",
                            rusqlite::params![owner],
                            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(|(style, bot_avatar)| {
                let chat_style = ChatStyle::from_str(&style).map_err(|err| {
                    PersistenceError::InvalidRow(format!("invalid chat style: {err}"))
                })?;
                Ok(UserPreferences {
                    chat_style,
                    bot_avatar,
                })
            })
            .transpose()
        })
    }

    fn save_preferences(
        &self,
        owner: UserId,
        preferences: &UserPreferences,
    ) -> StoreFuture<'_, PersistenceResult<()>> {
        let style = preferences.chat_style.as_str();
        let avatar = preferences.bot_avatar.clone();
        Box::pin(async move {
            let now_ms = Utc::now().timestamp_millis();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT OR REPLACE INTO user_preferences
                             (user_id, chat_style, bot_avatar, updated_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![owner, style, avatar, now_ms],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn create_invite(
        &self,
        session: SessionId,
        inviter: UserId,
        invitee_email: &str,
    ) -> StoreFuture<'_, PersistenceResult<SessionInvite>> {
        let email = invitee_email.trim().to_lowercase();
        Box::pin(async move {
            let now = Utc::now();
            let invite = SessionInvite {
                id: InviteId::new(),
                session_id: session,
                inviter_id: inviter,
                invitee_email: email,
                status: InviteStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            let (id, email, status, now_ms) = (
                invite.id,
                invite.invitee_email.clone(),
                invite.status.as_str(),
                now.timestamp_millis(),
            );
            let inserted = self
                .conn
                .call(move |conn| {
                    let exists: Option<i64> = conn
                        .query_row(
                            "SELECT 1 FROM chat_sessions WHERE id = ?1",
                            rusqlite::params![session],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if exists.is_none() {
                        return Ok(false);
                    }
                    conn.execute(
                        &format!(
                            "INSERT INTO session_invites ({INVITE_COLUMNS})
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                        ),
                        rusqlite::params![id, session, inviter, email, status, now_ms, now_ms],
                    )?;
                    Ok(true)
                })
                .await?;

            if !inserted {
                return Err(PersistenceError::not_found("chat_sessions", session));
            }
            Ok(invite)
        })
    }

    fn list_invites_for(
        &self,
        invitee_email: &str,
    ) -> StoreFuture<'_, PersistenceResult<Vec<SessionInvite>>> {
        let email = invitee_email.trim().to_lowercase();
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {INVITE_COLUMNS}
                         FROM session_invites
                         WHERE invitee_email = ?1
                         ORDER BY created_at DESC, rowid DESC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![email], invite_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(map_invite).collect()
        })
    }

    fn set_invite_status(
        &self,
        id: InviteId,
        status: InviteStatus,
    ) -> StoreFuture<'_, PersistenceResult<SessionInvite>> {
        Box::pin(async move {
            let now_ms = Utc::now().timestamp_millis();
            let row = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        "UPDATE session_invites SET status = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![status.as_str(), now_ms, id],
                    )?;
                    if changed == 0 {
                        return Ok(None);
                    }
                    let row = conn
                        .query_row(
                            &format!("SELECT {INVITE_COLUMNS} FROM session_invites WHERE id = ?1"),
                            rusqlite::params![id],
                            invite_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            let row = row.ok_or_else(|| PersistenceError::not_found("session_invites", id))?;
            map_invite(row)
        })
    }
}
