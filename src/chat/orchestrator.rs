//! The chat orchestrator.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{AbortRegistration, Abortable};
use url::Url;

use crate::chat::location;
use crate::chat::notify::Notification;
use crate::chat::ordering::{derive_title, most_recent, sort_sessions};
use crate::chat::{Activity, WorkspacePhase};
use crate::core::config::{ChatConfig, ExportConfig};
use crate::core::errors::{ChatError, ChatResult};
use crate::core::ids::{FileId, InviteId, MessageId, SessionId, UserId, WorkspaceId};
use crate::core::models::{
    ChatMessage, ChatSession, FileSource, FileUpload, InviteStatus, MessageRole, SessionInvite,
    Workspace, WorkspaceFile,
};
use crate::export::{ExportSummary, export_with_config, select_recent};
use crate::extraction::{ContentExtractor, ExtractionInput};
use crate::llm::LlmClient;
use crate::persistence::PersistenceGateway;

/// Separator between file sections in the model context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Messages replayed as context for suggestions when no file is attached.
const TRANSCRIPT_MESSAGES: usize = 10;

/// Coordinates workspaces, sessions, messages and files for one user.
///
/// Every mutating operation takes `&mut self`, so state changes never
/// interleave. Failures are pushed as error notifications and returned.
pub struct ChatOrchestrator {
    gateway: Arc<dyn PersistenceGateway>,
    llm: LlmClient,
    extractor: ContentExtractor,
    config: ChatConfig,
    export: ExportConfig,
    owner: UserId,

    phase: WorkspacePhase,
    busy: Option<Activity>,
    workspaces: Vec<Workspace>,
    active_workspace: Option<WorkspaceId>,
    sessions: Vec<ChatSession>,
    insertion_order: Vec<SessionId>,
    active_session: Option<SessionId>,
    messages: Vec<ChatMessage>,
    files: Vec<WorkspaceFile>,
    selection: HashSet<SessionId>,
    notifications: Vec<Notification>,
}

impl ChatOrchestrator {
    /// Create an orchestrator for `owner` with default settings.
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        llm: LlmClient,
        extractor: ContentExtractor,
        owner: UserId,
    ) -> Self {
        Self {
            gateway,
            llm,
            extractor,
            config: ChatConfig::default(),
            export: ExportConfig::default(),
            owner,
            phase: WorkspacePhase::Idle,
            busy: None,
            workspaces: Vec::new(),
            active_workspace: None,
            sessions: Vec::new(),
            insertion_order: Vec::new(),
            active_session: None,
            messages: Vec::new(),
            files: Vec::new(),
            selection: HashSet::new(),
            notifications: Vec::new(),
        }
    }

    /// Replace the orchestrator settings.
    #[must_use]
    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the export settings.
    #[must_use]
    pub fn with_export_config(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    // ===== State ============================================================

    /// Workspace lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> WorkspacePhase {
        self.phase
    }

    /// Operation in flight, if any.
    #[must_use]
    pub const fn busy(&self) -> Option<Activity> {
        self.busy
    }

    /// Whether a message is being sent.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.busy == Some(Activity::Sending)
    }

    /// Known workspaces.
    #[must_use]
    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    /// Active workspace.
    #[must_use]
    pub const fn active_workspace(&self) -> Option<WorkspaceId> {
        self.active_workspace
    }

    /// Sessions of the active workspace, pinned first then most recent.
    #[must_use]
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Active session.
    #[must_use]
    pub const fn active_session(&self) -> Option<SessionId> {
        self.active_session
    }

    /// Messages of the active session, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Files of the active workspace, newest first.
    #[must_use]
    pub fn files(&self) -> &[WorkspaceFile] {
        &self.files
    }

    /// Sessions marked for bulk deletion.
    #[must_use]
    pub const fn selection(&self) -> &HashSet<SessionId> {
        &self.selection
    }

    /// Drain pending notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // ===== Workspaces =======================================================

    /// Fetch the user's workspaces.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn load_workspaces(&mut self) -> ChatResult<&[Workspace]> {
        let result = self
            .bounded("load workspaces", self.gateway.list_workspaces(self.owner))
            .await;
        self.workspaces = self.surface("Could not load workspaces", result)?;
        Ok(&self.workspaces)
    }

    /// Create a workspace and make it active.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn create_workspace(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> ChatResult<WorkspaceId> {
        let result = self
            .bounded(
                "create workspace",
                self.gateway.create_workspace(self.owner, name.trim(), description),
            )
            .await;
        let workspace = self.surface("Could not create workspace", result)?;
        let id = workspace.id;
        tracing::info!("Created workspace {id}");
        self.workspaces.push(workspace);
        self.select_workspace(id).await?;
        Ok(id)
    }

    /// Rename a workspace and replace its description.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn rename_workspace(
        &mut self,
        id: WorkspaceId,
        name: &str,
        description: Option<&str>,
    ) -> ChatResult<()> {
        let result = self
            .bounded(
                "rename workspace",
                self.gateway.update_workspace(id, name.trim(), description),
            )
            .await;
        let updated = self.surface("Could not rename workspace", result)?;
        match self.workspaces.iter_mut().find(|w| w.id == id) {
            Some(slot) => *slot = updated,
            None => self.workspaces.push(updated),
        }
        Ok(())
    }

    /// Delete a workspace with everything in it.
    ///
    /// Deleting the active workspace selects the first remaining one.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn delete_workspace(&mut self, id: WorkspaceId) -> ChatResult<()> {
        let result = self
            .bounded("delete workspace", self.gateway.delete_workspace(id))
            .await;
        self.surface("Could not delete workspace", benign_not_found(result))?;

        self.workspaces.retain(|w| w.id != id);
        if self.active_workspace == Some(id) {
            self.clear_workspace_state();
            if let Some(next) = self.workspaces.first().map(|w| w.id) {
                self.select_workspace(next).await?;
            }
        }
        Ok(())
    }

    /// Make `id` active: load its sessions and files, then open the most
    /// recently active session.
    ///
    /// # Errors
    /// Returns [`ChatError::NotFound`] for an unknown workspace, or an error
    /// if a gateway call fails or times out.
    pub async fn select_workspace(&mut self, id: WorkspaceId) -> ChatResult<()> {
        if !self.workspaces.iter().any(|w| w.id == id) {
            let err = ChatError::NotFound(format!("workspace {id}"));
            return self.surface("Could not open workspace", Err(err));
        }

        let previous = self.phase;
        self.phase = WorkspacePhase::Loading;
        self.busy = Some(Activity::LoadingWorkspace);
        let result = self.load_workspace(id).await;
        self.busy = None;

        match result {
            Ok(()) => {
                self.phase = WorkspacePhase::Ready;
                tracing::info!(
                    "Workspace {id} ready: {} sessions, {} files",
                    self.sessions.len(),
                    self.files.len()
                );
                Ok(())
            }
            Err(err) => {
                // The previous workspace is still loaded.
                self.phase = previous;
                self.surface("Could not open workspace", Err(err))
            }
        }
    }

    async fn load_workspace(&mut self, id: WorkspaceId) -> ChatResult<()> {
        let mut sessions = self
            .bounded("load sessions", self.gateway.list_sessions(id))
            .await?;
        let files = self
            .bounded("load files", self.gateway.list_files(id))
            .await?;

        let insertion_order: Vec<SessionId> = sessions.iter().map(|s| s.id).collect();
        sort_sessions(&mut sessions, &insertion_order);
        let active = most_recent(&sessions);
        let messages = match active {
            Some(session) => {
                self.bounded("load messages", self.gateway.list_messages(session))
                    .await?
            }
            None => Vec::new(),
        };

        self.active_workspace = Some(id);
        self.sessions = sessions;
        self.insertion_order = insertion_order;
        self.files = files;
        self.active_session = active;
        self.messages = messages;
        self.selection.clear();
        Ok(())
    }

    fn clear_workspace_state(&mut self) {
        self.phase = WorkspacePhase::Idle;
        self.active_workspace = None;
        self.sessions.clear();
        self.insertion_order.clear();
        self.active_session = None;
        self.messages.clear();
        self.files.clear();
        self.selection.clear();
    }

    // ===== Sessions =========================================================

    /// Open a session of the active workspace and load its messages.
    ///
    /// # Errors
    /// Returns [`ChatError::NotFound`] for an unknown session, or an error
    /// if the gateway call fails or times out.
    pub async fn select_session(&mut self, id: SessionId) -> ChatResult<()> {
        if !self.sessions.iter().any(|s| s.id == id) {
            let err = ChatError::NotFound(format!("session {id}"));
            return self.surface("Could not open chat", Err(err));
        }
        let result = self
            .bounded("load messages", self.gateway.list_messages(id))
            .await;
        self.messages = self.surface("Could not open chat", result)?;
        self.active_session = Some(id);
        self.selection.clear();
        Ok(())
    }

    /// Start a session, titled from `initial_message` when given, and send
    /// that message.
    ///
    /// # Errors
    /// Returns [`ChatError::NoActiveWorkspace`] without a workspace, or an
    /// error if creating the session or sending the message fails.
    pub async fn new_session(&mut self, initial_message: Option<&str>) -> ChatResult<SessionId> {
        let initial = initial_message.map(str::trim).filter(|m| !m.is_empty());
        let result = self.open_session(initial).await;
        let id = self.surface("Could not start a new chat", result)?;
        if let Some(message) = initial {
            self.send_message(message).await?;
        }
        Ok(id)
    }

    async fn open_session(&mut self, initial: Option<&str>) -> ChatResult<SessionId> {
        let workspace = self.active_workspace.ok_or(ChatError::NoActiveWorkspace)?;
        let title = derive_title(
            initial,
            self.config.title_max_chars,
            &self.config.default_title,
        );
        let session = self
            .bounded(
                "create session",
                self.gateway.create_session(workspace, self.owner, &title),
            )
            .await?;

        let id = session.id;
        tracing::debug!("Opened session {id} \"{title}\"");
        self.sessions.insert(0, session);
        self.insertion_order.insert(0, id);
        sort_sessions(&mut self.sessions, &self.insertion_order);
        self.active_session = Some(id);
        self.messages.clear();
        self.selection.clear();
        Ok(id)
    }

    /// Rename a session; a blank title restores the default.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn rename_session(&mut self, id: SessionId, title: &str) -> ChatResult<()> {
        let title = match title.trim() {
            "" => self.config.default_title.clone(),
            trimmed => trimmed.to_string(),
        };
        let result = self
            .bounded("rename session", self.gateway.rename_session(id, &title))
            .await;
        self.surface("Could not rename chat", result)?;
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
            session.title = title;
        }
        Ok(())
    }

    /// Toggle the pinned flag; returns the new value.
    ///
    /// # Errors
    /// Returns [`ChatError::NotFound`] for an unknown session, or an error
    /// if the gateway call fails or times out.
    pub async fn pin_session(&mut self, id: SessionId) -> ChatResult<bool> {
        let Some(pinned) = self.sessions.iter().find(|s| s.id == id).map(|s| !s.is_pinned)
        else {
            let err = ChatError::NotFound(format!("session {id}"));
            return self.surface("Could not pin chat", Err(err));
        };
        let result = self
            .bounded("pin session", self.gateway.set_session_pinned(id, pinned))
            .await;
        self.surface("Could not pin chat", result)?;

        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
            session.is_pinned = pinned;
        }
        sort_sessions(&mut self.sessions, &self.insertion_order);
        Ok(pinned)
    }

    /// Delete a session. Deleting the active one opens the most recently
    /// active remaining session, or none.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn delete_session(&mut self, id: SessionId) -> ChatResult<()> {
        let result = self
            .bounded("delete session", self.gateway.delete_session(id))
            .await;
        self.surface("Could not delete chat", benign_not_found(result))?;

        self.sessions.retain(|s| s.id != id);
        self.insertion_order.retain(|s| *s != id);
        self.selection.remove(&id);

        if self.active_session == Some(id) {
            self.active_session = None;
            self.messages.clear();
            if let Some(next) = most_recent(&self.sessions) {
                self.select_session(next).await?;
            }
        }
        Ok(())
    }

    /// Add or remove a session from the bulk selection; returns whether it
    /// is now selected.
    pub fn toggle_session_selection(&mut self, id: SessionId) -> bool {
        if self.selection.remove(&id) {
            false
        } else {
            self.selection.insert(id)
        }
    }

    /// Delete every selected session; returns how many were deleted.
    ///
    /// # Errors
    /// Stops at the first failing deletion and returns its error.
    pub async fn delete_selected_sessions(&mut self) -> ChatResult<usize> {
        let mut selected: Vec<SessionId> = self.selection.iter().copied().collect();
        selected.sort_unstable();
        let mut deleted = 0;
        for id in selected {
            self.delete_session(id).await?;
            deleted += 1;
        }
        if deleted > 0 {
            self.notifications.push(Notification::success(
                "Chats deleted",
                format!("Deleted {deleted} chat(s)."),
            ));
        }
        Ok(deleted)
    }

    // ===== Messages =========================================================

    /// Send `content` in the active session and return the assistant reply.
    ///
    /// Starts a session titled from `content` when none is active. The user
    /// message stays in the transcript even when the model call fails.
    ///
    /// # Errors
    /// Returns [`ChatError::EmptyMessage`], [`ChatError::NoActiveWorkspace`],
    /// or the gateway, model or timeout failure that stopped the pipeline.
    pub async fn send_message(&mut self, content: &str) -> ChatResult<ChatMessage> {
        self.send(content, None).await
    }

    /// [`send_message`](Self::send_message) that stops waiting for the model
    /// once `abort` fires, returning [`ChatError::Cancelled`].
    ///
    /// # Errors
    /// Same as [`send_message`](Self::send_message), plus
    /// [`ChatError::Cancelled`].
    pub async fn send_message_cancellable(
        &mut self,
        content: &str,
        abort: AbortRegistration,
    ) -> ChatResult<ChatMessage> {
        self.send(content, Some(abort)).await
    }

    async fn send(
        &mut self,
        content: &str,
        abort: Option<AbortRegistration>,
    ) -> ChatResult<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.active_workspace.is_none() {
            return self.surface("Message not sent", Err(ChatError::NoActiveWorkspace));
        }
        let session = match self.active_session {
            Some(session) => session,
            None => {
                let result = self.open_session(Some(content)).await;
                self.surface("Could not start a new chat", result)?
            }
        };

        self.busy = Some(Activity::Sending);
        let result = self.run_send(session, content, abort).await;
        self.busy = None;
        self.surface("Message not sent", result)
    }

    async fn run_send(
        &mut self,
        session: SessionId,
        content: &str,
        abort: Option<AbortRegistration>,
    ) -> ChatResult<ChatMessage> {
        let user_message = self
            .bounded(
                "save message",
                self.gateway.create_message(session, MessageRole::User, content),
            )
            .await?;
        self.record_message(user_message);

        let context = self.build_context().await;
        let ask = self.bounded("ask the model", self.llm.ask(content, context.as_deref()));
        let answer = match abort {
            Some(registration) => Abortable::new(ask, registration)
                .await
                .map_err(|_| ChatError::Cancelled)??,
            None => ask.await?,
        };

        let saved = self
            .bounded(
                "save answer",
                self.gateway
                    .create_message(session, MessageRole::Assistant, &answer),
            )
            .await;
        match saved {
            Ok(message) => {
                self.record_message(message.clone());
                Ok(message)
            }
            Err(err) => {
                tracing::warn!("Answer for session {session} kept in memory only: {err}");
                self.record_message(ChatMessage {
                    id: MessageId::new(),
                    content: answer,
                    role: MessageRole::Assistant,
                    session_id: session,
                    created_at: Utc::now(),
                });
                Err(err)
            }
        }
    }

    fn record_message(&mut self, message: ChatMessage) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == message.session_id) {
            session.touch(&message);
        }
        sort_sessions(&mut self.sessions, &self.insertion_order);
        if self.active_session == Some(message.session_id) {
            self.messages.push(message);
        }
    }

    /// Text of the most recently uploaded files, extracting and caching any
    /// file not read yet.
    async fn build_context(&mut self) -> Option<String> {
        let mut recent: Vec<usize> = (0..self.files.len()).collect();
        recent.sort_by(|&a, &b| self.files[b].uploaded_at.cmp(&self.files[a].uploaded_at));
        recent.truncate(self.config.context_file_limit);

        let mut sections = Vec::with_capacity(recent.len());
        for index in recent {
            let content = match self.files[index].content.clone() {
                Some(content) => Some(content),
                None => {
                    let file = self.files[index].clone();
                    match self.file_text(&file).await {
                        Ok(text) => {
                            self.files[index].content.clone_from(&text);
                            text
                        }
                        Err(err) => {
                            tracing::warn!("Skipping {} in context: {err}", file.name);
                            None
                        }
                    }
                }
            };
            if let Some(content) = content.filter(|c| !c.trim().is_empty()) {
                sections.push(format!("File: {}\n{content}", self.files[index].name));
            }
        }

        if sections.is_empty() {
            None
        } else {
            tracing::debug!("Built context from {} file(s)", sections.len());
            Some(sections.join(CONTEXT_SEPARATOR))
        }
    }

    async fn file_text(&self, file: &WorkspaceFile) -> ChatResult<Option<String>> {
        let input = match &file.source {
            FileSource::UrlReference { url } => ExtractionInput::Url(url.clone()),
            FileSource::Stored { .. } => {
                let bytes = self
                    .bounded("read file", self.gateway.read_file_bytes(file))
                    .await?;
                ExtractionInput::Bytes {
                    name: file.name.clone(),
                    mime_type: file.mime_type.clone(),
                    bytes,
                }
            }
        };
        Ok(self.extractor.extract(input).await)
    }

    /// Follow-up questions grounded on the attached files, or on the recent
    /// transcript when no file has content.
    ///
    /// # Errors
    /// Returns an error if the model call fails or times out.
    pub async fn suggest_questions(&mut self) -> ChatResult<Vec<String>> {
        let context = match self.build_context().await {
            Some(context) => Some(context),
            None => self.transcript(),
        };
        let result = self
            .bounded(
                "suggest questions",
                self.llm.suggest_questions(context.as_deref()),
            )
            .await;
        self.surface("Could not suggest questions", result)
    }

    fn transcript(&self) -> Option<String> {
        let skip = self.messages.len().saturating_sub(TRANSCRIPT_MESSAGES);
        let lines: Vec<String> = self.messages[skip..]
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    // ===== Files ============================================================

    /// Upload a file to the active workspace.
    ///
    /// # Errors
    /// Returns [`ChatError::NoActiveWorkspace`] without a workspace, or an
    /// error if the gateway call fails or times out.
    pub async fn upload_file(&mut self, upload: FileUpload) -> ChatResult<WorkspaceFile> {
        let Some(workspace) = self.active_workspace else {
            return self.surface("Upload failed", Err(ChatError::NoActiveWorkspace));
        };
        let name = upload.name.clone();

        self.busy = Some(Activity::Uploading);
        let result = self
            .bounded(
                "upload file",
                self.gateway.upload_file(workspace, self.owner, upload),
            )
            .await;
        self.busy = None;

        let file = self.surface("Upload failed", result)?;
        self.files.insert(0, file.clone());
        self.notifications.push(Notification::success(
            "File uploaded",
            format!("{name} was added to the workspace."),
        ));
        Ok(file)
    }

    /// Attach an external link as a pseudo-file. URL references live in
    /// local state only.
    ///
    /// # Errors
    /// Returns [`ChatError::InvalidUrl`] unless `raw` is an http(s) URL, or
    /// [`ChatError::NoActiveWorkspace`] without a workspace.
    pub fn add_url_file(&mut self, raw: &str) -> ChatResult<WorkspaceFile> {
        let url = match Url::parse(raw.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => {
                let err = ChatError::InvalidUrl(raw.trim().to_string());
                return self.surface("Could not add link", Err(err));
            }
        };
        let Some(workspace) = self.active_workspace else {
            return self.surface("Could not add link", Err(ChatError::NoActiveWorkspace));
        };

        let file = WorkspaceFile {
            id: FileId::url_reference(),
            name: url.to_string(),
            size: 0,
            mime_type: "text/html".to_string(),
            url: url.to_string(),
            workspace_id: workspace,
            owner_id: self.owner,
            uploaded_at: Utc::now(),
            content: None,
            source: FileSource::UrlReference {
                url: url.to_string(),
            },
        };
        self.files.insert(0, file.clone());
        Ok(file)
    }

    /// Remove a file; URL references are dropped locally.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn delete_file(&mut self, id: &FileId) -> ChatResult<()> {
        if !id.is_url_reference() {
            let result = self
                .bounded("delete file", self.gateway.delete_file(id))
                .await;
            self.surface("Could not delete file", benign_not_found(result))?;
        }
        self.files.retain(|f| &f.id != id);
        Ok(())
    }

    /// Extracted text of a file for preview, cached after the first read.
    ///
    /// # Errors
    /// Returns [`ChatError::NotFound`] for an unknown file, or an error if
    /// the blob cannot be read.
    pub async fn load_file_content(&mut self, id: &FileId) -> ChatResult<String> {
        let Some(index) = self.files.iter().position(|f| &f.id == id) else {
            let err = ChatError::NotFound(format!("file {id}"));
            return self.surface("Could not open file", Err(err));
        };
        if let Some(content) = &self.files[index].content {
            return Ok(content.clone());
        }

        let file = self.files[index].clone();
        self.busy = Some(Activity::LoadingFileContent);
        let result = self.file_text(&file).await;
        self.busy = None;

        let text = self.surface("Could not open file", result)?.unwrap_or_default();
        self.files[index].content = Some(text.clone());
        Ok(text)
    }

    // ===== Export ===========================================================

    /// Write the most recent sessions of the active workspace to a workbook
    /// in `out_dir`.
    ///
    /// # Errors
    /// Returns an error if messages cannot be loaded, nothing is exported,
    /// or the workbook cannot be written.
    pub async fn export_chats(&mut self, out_dir: &Path) -> ChatResult<ExportSummary> {
        let result = self.export_recent(out_dir).await;
        let summary = self.surface("Export failed", result)?;
        self.notifications.push(Notification::success(
            "Export complete",
            format!(
                "Exported {} chat(s) to {}.",
                summary.count(),
                summary.path.display()
            ),
        ));
        Ok(summary)
    }

    async fn export_recent(&self, out_dir: &Path) -> ChatResult<ExportSummary> {
        let selected: Vec<ChatSession> = select_recent(&self.sessions, self.export.max_sessions)
            .into_iter()
            .cloned()
            .collect();
        let mut loaded = Vec::with_capacity(selected.len());
        for mut session in selected {
            session.messages = self
                .bounded("load messages", self.gateway.list_messages(session.id))
                .await?;
            loaded.push(session);
        }
        Ok(export_with_config(&loaded, &self.export, out_dir)?)
    }

    // ===== Sharing ==========================================================

    /// Invite `invitee_email` to a session of the active workspace.
    ///
    /// # Errors
    /// Returns [`ChatError::InvalidEmail`] or [`ChatError::NotFound`], or an
    /// error if the gateway call fails or times out.
    pub async fn share_session(
        &mut self,
        session: SessionId,
        invitee_email: &str,
    ) -> ChatResult<SessionInvite> {
        let email = invitee_email.trim();
        if !is_plausible_email(email) {
            let err = ChatError::InvalidEmail(email.to_string());
            return self.surface("Could not share chat", Err(err));
        }
        if !self.sessions.iter().any(|s| s.id == session) {
            let err = ChatError::NotFound(format!("session {session}"));
            return self.surface("Could not share chat", Err(err));
        }

        let result = self
            .bounded(
                "share session",
                self.gateway.create_invite(session, self.owner, email),
            )
            .await;
        let invite = self.surface("Could not share chat", result)?;
        self.notifications.push(Notification::success(
            "Invite sent",
            format!("{} can now join this chat.", invite.invitee_email),
        ));
        Ok(invite)
    }

    /// Invites still awaiting an answer from `email`.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn pending_invites(&mut self, email: &str) -> ChatResult<Vec<SessionInvite>> {
        let result = self
            .bounded("load invites", self.gateway.list_invites_for(email))
            .await;
        let invites = self.surface("Could not load invites", result)?;
        Ok(invites
            .into_iter()
            .filter(|invite| invite.status.is_open())
            .collect())
    }

    /// Accept or decline an invite.
    ///
    /// # Errors
    /// Returns an error if the gateway call fails or times out.
    pub async fn respond_to_invite(
        &mut self,
        id: InviteId,
        accept: bool,
    ) -> ChatResult<SessionInvite> {
        let status = if accept {
            InviteStatus::Accepted
        } else {
            InviteStatus::Rejected
        };
        let result = self
            .bounded("answer invite", self.gateway.set_invite_status(id, status))
            .await;
        self.surface("Could not answer invite", result)
    }

    // ===== Location =========================================================

    /// `base` carrying the active workspace.
    #[must_use]
    pub fn current_location(&self, base: &Url) -> Url {
        location::with_workspace(base, self.active_workspace)
    }

    /// Open the workspace named in `url`; returns whether one was opened.
    ///
    /// # Errors
    /// Returns an error if opening the workspace fails.
    pub async fn restore_from_location(&mut self, url: &Url) -> ChatResult<bool> {
        let Some(id) = location::workspace_from(url) else {
            return Ok(false);
        };
        if self.active_workspace == Some(id) || !self.workspaces.iter().any(|w| w.id == id) {
            return Ok(false);
        }
        self.select_workspace(id).await?;
        Ok(true)
    }

    // ===== Helpers ==========================================================

    async fn bounded<T, E>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, E>>,
    ) -> ChatResult<T>
    where
        ChatError: From<E>,
    {
        let after = self.config.request_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ChatError::Timeout { operation, after }),
        }
    }

    fn surface<T>(&mut self, title: &str, result: ChatResult<T>) -> ChatResult<T> {
        if let Err(err) = &result {
            tracing::warn!("{title}: {err}");
            self.notifications
                .push(Notification::error(title, err.to_string()));
        }
        result
    }
}

fn benign_not_found(result: ChatResult<()>) -> ChatResult<()> {
    match result {
        Err(ChatError::NotFound(what)) => {
            tracing::debug!("Already deleted: {what}");
            Ok(())
        }
        other => other,
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_plausibility() {
        assert!(is_plausible_email("ana@example.com"));
        assert!(!is_plausible_email("ana@example"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ana@@example.com"));
        assert!(!is_plausible_email("an a@example.com"));
        assert!(!is_plausible_email("ana.example.com"));
    }
}
