use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::AbortHandle;
use tempfile::TempDir;
use url::Url;

use super::*;
use crate::core::config::{ChatConfig, ExtractionConfig};
use crate::core::errors::{ChatError, LlmError, LlmResult};
use crate::core::ids::{SessionId, UserId, WorkspaceId};
use crate::core::models::{FileUpload, InviteStatus, MessageRole};
use crate::extraction::ContentExtractor;
use crate::llm::tests::ScriptedTransport;
use crate::llm::{CompletionTransport, LlmClient, LlmFuture, ProxyRequest};
use crate::persistence::{FsBlobStore, PersistenceGateway, SqlitePersistence};

struct Fixture {
    chat: ChatOrchestrator,
    gateway: Arc<SqlitePersistence>,
    _dir: TempDir,
}

async fn fixture_with(transport: Arc<dyn CompletionTransport>, config: ChatConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let blobs = FsBlobStore::new(dir.path().join("blobs"), "http://localhost/files")
        .await
        .unwrap();
    let gateway = Arc::new(SqlitePersistence::open_in_memory(Arc::new(blobs)).await.unwrap());
    let chat = orchestrator(gateway.clone(), transport, config);
    Fixture {
        chat,
        gateway,
        _dir: dir,
    }
}

fn orchestrator(
    gateway: Arc<SqlitePersistence>,
    transport: Arc<dyn CompletionTransport>,
    config: ChatConfig,
) -> ChatOrchestrator {
    let llm = LlmClient::new(transport).unwrap();
    let extractor = ContentExtractor::new(ExtractionConfig::default()).unwrap();
    ChatOrchestrator::new(gateway, llm, extractor, UserId::new()).with_config(config)
}

async fn fixture(transport: Arc<ScriptedTransport>) -> Fixture {
    fixture_with(transport, ChatConfig::default()).await
}

async fn with_workspace(transport: Arc<ScriptedTransport>) -> (Fixture, WorkspaceId) {
    let mut f = fixture(transport).await;
    let workspace = f.chat.create_workspace("Research", None).await.unwrap();
    (f, workspace)
}

fn text_file(name: &str, body: &str) -> FileUpload {
    FileUpload::new(name, "text/plain", body.as_bytes().to_vec())
}

async fn pause() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

fn session_ids(chat: &ChatOrchestrator) -> Vec<SessionId> {
    chat.sessions().iter().map(|s| s.id).collect()
}

/// Answers after a long delay.
struct SlowTransport;

impl CompletionTransport for SlowTransport {
    fn complete(&self, _request: ProxyRequest) -> LlmFuture<'_, LlmResult<String>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        })
    }
}

/// Deletes the target session while the model is "thinking".
struct DroppingTransport {
    gateway: Arc<SqlitePersistence>,
    session: Mutex<Option<SessionId>>,
}

impl CompletionTransport for DroppingTransport {
    fn complete(&self, _request: ProxyRequest) -> LlmFuture<'_, LlmResult<String>> {
        let session = *self.session.lock().unwrap();
        Box::pin(async move {
            if let Some(session) = session {
                self.gateway.delete_session(session).await.unwrap();
            }
            Ok("An answer nobody saved".to_string())
        })
    }
}

#[tokio::test]
async fn test_first_message_titles_the_session() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    assert_eq!(f.chat.phase(), WorkspacePhase::Ready);
    assert_eq!(f.chat.active_session(), None);

    let reply = f
        .chat
        .send_message("Help me plan my vacation to Japan this summer")
        .await
        .unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "ok");

    let session = &f.chat.sessions()[0];
    assert_eq!(session.title, "Help me plan my vacation to Ja...");
    assert_eq!(session.last_message.as_deref(), Some("ok"));
    assert_eq!(f.chat.active_session(), Some(session.id));

    let roles: Vec<MessageRole> = f.chat.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    assert_eq!(f.gateway.list_messages(session.id).await.unwrap().len(), 2);
    assert!(!f.chat.is_processing());
}

#[tokio::test]
async fn test_new_session_without_message_uses_default_title() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let id = f.chat.new_session(None).await.unwrap();
    assert_eq!(f.chat.sessions()[0].title, "New Chat");
    assert_eq!(f.chat.active_session(), Some(id));
    assert!(f.chat.messages().is_empty());
}

#[tokio::test]
async fn test_blank_message_and_missing_workspace_are_rejected() {
    let mut f = fixture(ScriptedTransport::answering(vec![])).await;
    assert!(matches!(
        f.chat.send_message("   ").await,
        Err(ChatError::EmptyMessage)
    ));
    assert!(matches!(
        f.chat.send_message("hello").await,
        Err(ChatError::NoActiveWorkspace)
    ));
}

#[tokio::test]
async fn test_context_holds_three_most_recent_files() {
    let transport = ScriptedTransport::answering(vec![]);
    let (mut f, _) = with_workspace(transport.clone()).await;
    for (name, body) in [
        ("one.txt", "alpha"),
        ("two.txt", "bravo"),
        ("three.txt", "charlie"),
        ("four.txt", "delta"),
    ] {
        f.chat.upload_file(text_file(name, body)).await.unwrap();
        pause().await;
    }
    assert_eq!(f.chat.files()[0].name, "four.txt");

    f.chat.send_message("Summarize my notes").await.unwrap();
    let request = transport.last_request().unwrap();
    let context = request.file_context.unwrap();
    assert!(request.include_file_content);
    assert!(context.contains("File: four.txt\ndelta"));
    assert!(context.contains("File: three.txt\ncharlie"));
    assert!(context.contains("File: two.txt\nbravo"));
    assert!(!context.contains("one.txt"));
    assert!(!context.contains("alpha"));

    let cached: Vec<bool> = f.chat.files().iter().map(|f| f.content.is_some()).collect();
    assert_eq!(cached, vec![true, true, true, false]);
}

#[tokio::test]
async fn test_model_failure_keeps_user_message() {
    let transport = ScriptedTransport::answering(vec![Err(LlmError::Remote {
        status: 502,
        message: "quota exceeded".to_string(),
    })]);
    let (mut f, _) = with_workspace(transport).await;
    f.chat.take_notifications();

    let err = f.chat.send_message("Hello?").await.unwrap_err();
    assert!(matches!(err, ChatError::Llm(LlmError::Remote { status: 502, .. })));
    assert!(!f.chat.is_processing());
    assert_eq!(f.chat.busy(), None);

    assert_eq!(f.chat.messages().len(), 1);
    assert_eq!(f.chat.messages()[0].role, MessageRole::User);
    let session = f.chat.active_session().unwrap();
    assert_eq!(f.gateway.list_messages(session).await.unwrap().len(), 1);

    let notifications = f.chat.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].is_error());
    assert_eq!(notifications[0].title, "Message not sent");
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let config = ChatConfig::default().with_timeout(Duration::from_millis(300));
    let mut f = fixture_with(Arc::new(SlowTransport), config).await;
    f.chat.create_workspace("Slow", None).await.unwrap();

    let err = f.chat.send_message("Anyone there?").await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::Timeout {
            operation: "ask the model",
            ..
        }
    ));
    assert_eq!(f.chat.messages().len(), 1);
    assert!(!f.chat.is_processing());
}

#[tokio::test]
async fn test_cancelled_send_behaves_like_failure() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let (handle, registration) = AbortHandle::new_pair();
    handle.abort();

    let err = f
        .chat
        .send_message_cancellable("Never mind", registration)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Cancelled));
    assert_eq!(f.chat.messages().len(), 1);
    assert!(!f.chat.is_processing());
}

#[tokio::test]
async fn test_unsaved_answer_is_kept_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = FsBlobStore::new(dir.path().join("blobs"), "http://localhost/files")
        .await
        .unwrap();
    let gateway = Arc::new(SqlitePersistence::open_in_memory(Arc::new(blobs)).await.unwrap());
    let transport = Arc::new(DroppingTransport {
        gateway: gateway.clone(),
        session: Mutex::new(None),
    });
    let mut chat = orchestrator(gateway, transport.clone(), ChatConfig::default());
    chat.create_workspace("Flaky", None).await.unwrap();
    let session = chat.new_session(None).await.unwrap();
    *transport.session.lock().unwrap() = Some(session);

    let err = chat.send_message("Save me").await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
    let contents: Vec<&str> = chat.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Save me", "An answer nobody saved"]);
    assert!(!chat.is_processing());
}

#[tokio::test]
async fn test_deleting_active_session_falls_back_to_most_recent() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let a = f.chat.new_session(None).await.unwrap();
    pause().await;
    let b = f.chat.new_session(None).await.unwrap();
    pause().await;
    let c = f.chat.new_session(None).await.unwrap();
    assert_eq!(f.chat.active_session(), Some(c));

    f.chat.delete_session(c).await.unwrap();
    assert_eq!(f.chat.active_session(), Some(b));
    assert_eq!(session_ids(&f.chat), vec![b, a]);

    f.chat.delete_session(c).await.unwrap();
    f.chat.delete_session(b).await.unwrap();
    f.chat.delete_session(a).await.unwrap();
    assert_eq!(f.chat.active_session(), None);
    assert!(f.chat.sessions().is_empty());
    assert!(f.chat.messages().is_empty());
}

#[tokio::test]
async fn test_pin_toggle_restores_order() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let oldest = f.chat.new_session(None).await.unwrap();
    pause().await;
    f.chat.new_session(None).await.unwrap();
    pause().await;
    f.chat.new_session(None).await.unwrap();
    let before = session_ids(&f.chat);
    assert_eq!(before[2], oldest);

    assert!(f.chat.pin_session(oldest).await.unwrap());
    assert_eq!(session_ids(&f.chat)[0], oldest);
    assert!(!f.chat.pin_session(oldest).await.unwrap());
    assert_eq!(session_ids(&f.chat), before);
}

#[tokio::test]
async fn test_bulk_delete_and_rename() {
    let (mut f, workspace) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let a = f.chat.new_session(None).await.unwrap();
    let b = f.chat.new_session(None).await.unwrap();
    let keep = f.chat.new_session(None).await.unwrap();

    f.chat.rename_session(keep, "  Budget  ").await.unwrap();
    f.chat.rename_session(a, " ").await.unwrap();
    assert_eq!(
        f.chat.sessions().iter().find(|s| s.id == keep).unwrap().title,
        "Budget"
    );

    assert!(f.chat.toggle_session_selection(a));
    assert!(f.chat.toggle_session_selection(b));
    assert!(f.chat.toggle_session_selection(keep));
    assert!(!f.chat.toggle_session_selection(keep));
    assert_eq!(f.chat.delete_selected_sessions().await.unwrap(), 2);
    assert_eq!(session_ids(&f.chat), vec![keep]);
    assert!(f.chat.selection().is_empty());

    let stored = f.gateway.list_sessions(workspace).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Budget");
}

#[tokio::test]
async fn test_url_references_stay_local() {
    let (mut f, workspace) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let link = f.chat.add_url_file("https://example.com/report").unwrap();
    assert!(link.is_url_reference());
    assert_eq!(link.size, 0);
    assert_eq!(f.chat.files().len(), 1);
    assert!(f.gateway.list_files(workspace).await.unwrap().is_empty());

    f.chat.delete_file(&link.id).await.unwrap();
    assert!(f.chat.files().is_empty());

    assert!(matches!(
        f.chat.add_url_file("ftp://example.com/file"),
        Err(ChatError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn test_file_content_is_cached_after_preview() {
    let (mut f, workspace) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let file = f
        .chat
        .upload_file(text_file("notes.txt", "remember the milk"))
        .await
        .unwrap();
    assert_eq!(f.chat.load_file_content(&file.id).await.unwrap(), "remember the milk");
    assert_eq!(
        f.chat.files()[0].content.as_deref(),
        Some("remember the milk")
    );

    f.chat.delete_file(&file.id).await.unwrap();
    assert!(f.chat.files().is_empty());
    assert!(f.gateway.list_files(workspace).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_suggestions_fall_back_to_transcript() {
    let transport = ScriptedTransport::answering(vec![
        Ok("Hello there".to_string()),
        Ok("1. What next?\n2. Why?\n3. How?".to_string()),
    ]);
    let (mut f, _) = with_workspace(transport.clone()).await;
    f.chat.send_message("hi").await.unwrap();

    let questions = f.chat.suggest_questions().await.unwrap();
    assert_eq!(questions, vec!["What next?", "Why?", "How?"]);
    let request = transport.last_request().unwrap();
    assert!(request.is_suggestion_request);
    let context = request.file_context.unwrap();
    assert!(context.contains("User: hi"));
    assert!(context.contains("Assistant: Hello there"));
}

#[tokio::test]
async fn test_deleting_active_workspace_selects_next() {
    let mut f = fixture(ScriptedTransport::answering(vec![])).await;
    let first = f.chat.create_workspace("First", None).await.unwrap();
    let second = f.chat.create_workspace("Second", Some("scratch")).await.unwrap();
    assert_eq!(f.chat.active_workspace(), Some(second));
    f.chat.new_session(None).await.unwrap();

    f.chat.delete_workspace(second).await.unwrap();
    assert_eq!(f.chat.active_workspace(), Some(first));
    assert_eq!(f.chat.phase(), WorkspacePhase::Ready);
    assert!(f.chat.sessions().is_empty());
    assert_eq!(f.chat.workspaces().len(), 1);

    f.chat.delete_workspace(first).await.unwrap();
    assert_eq!(f.chat.active_workspace(), None);
    assert_eq!(f.chat.phase(), WorkspacePhase::Idle);
}

#[tokio::test]
async fn test_workspace_reload_and_rename() {
    let mut f = fixture(ScriptedTransport::answering(vec![])).await;
    let id = f.chat.create_workspace("Draft", None).await.unwrap();
    f.chat.rename_workspace(id, "Final", Some("done")).await.unwrap();
    let loaded = f.chat.load_workspaces().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "Final");
    assert_eq!(loaded[0].description.as_deref(), Some("done"));

    assert!(matches!(
        f.chat.select_workspace(WorkspaceId::new()).await,
        Err(ChatError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_failed_workspace_switch_keeps_current_one() {
    let mut f = fixture(ScriptedTransport::answering(vec![])).await;
    let first = f.chat.create_workspace("First", None).await.unwrap();
    let second = f.chat.create_workspace("Second", None).await.unwrap();
    let session = f.chat.new_session(None).await.unwrap();
    f.chat.take_notifications();

    f.gateway.execute_raw("DROP TABLE files").await.unwrap();
    assert!(f.chat.select_workspace(first).await.is_err());

    assert_eq!(f.chat.phase(), WorkspacePhase::Ready);
    assert_eq!(f.chat.active_workspace(), Some(second));
    assert_eq!(session_ids(&f.chat), vec![session]);
    assert_eq!(f.chat.active_session(), Some(session));
    assert!(!f.chat.is_processing());
    assert_eq!(f.chat.take_notifications().len(), 1);
}

#[tokio::test]
async fn test_session_order_survives_reload() {
    let (mut f, workspace) = with_workspace(ScriptedTransport::answering(vec![])).await;
    for _ in 0..4 {
        f.chat.new_session(None).await.unwrap();
    }
    let before = session_ids(&f.chat);

    f.chat.select_workspace(workspace).await.unwrap();
    assert_eq!(session_ids(&f.chat), before);
}

#[tokio::test]
async fn test_location_round_trip() {
    let mut f = fixture(ScriptedTransport::answering(vec![])).await;
    let first = f.chat.create_workspace("First", None).await.unwrap();
    let second = f.chat.create_workspace("Second", None).await.unwrap();
    let base = Url::parse("https://app.katagrafy.ai/chat").unwrap();

    let url = f.chat.current_location(&base);
    assert_eq!(location::workspace_from(&url), Some(second));

    f.chat.select_workspace(first).await.unwrap();
    assert!(f.chat.restore_from_location(&url).await.unwrap());
    assert_eq!(f.chat.active_workspace(), Some(second));
    assert!(!f.chat.restore_from_location(&url).await.unwrap());
    assert!(!f.chat.restore_from_location(&base).await.unwrap());
}

#[tokio::test]
async fn test_export_recent_chats() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    f.chat.send_message("First question").await.unwrap();
    f.chat.new_session(Some("Second question")).await.unwrap();
    f.chat.take_notifications();

    let out = tempfile::tempdir().unwrap();
    let summary = f.chat.export_chats(out.path()).await.unwrap();
    assert_eq!(summary.count(), 2);
    assert!(summary.path.exists());
    assert_eq!(
        f.chat.take_notifications()[0].kind,
        NotificationKind::Success
    );
}

#[tokio::test]
async fn test_export_without_sessions_fails() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let out = tempfile::tempdir().unwrap();
    assert!(matches!(
        f.chat.export_chats(out.path()).await,
        Err(ChatError::Export(_))
    ));
}

#[tokio::test]
async fn test_share_and_answer_invite() {
    let (mut f, _) = with_workspace(ScriptedTransport::answering(vec![])).await;
    let session = f.chat.new_session(None).await.unwrap();

    assert!(matches!(
        f.chat.share_session(session, "not-an-email").await,
        Err(ChatError::InvalidEmail(_))
    ));
    assert!(matches!(
        f.chat.share_session(SessionId::new(), "bob@example.com").await,
        Err(ChatError::NotFound(_))
    ));

    let invite = f
        .chat
        .share_session(session, " Bob@Example.com ")
        .await
        .unwrap();
    assert_eq!(invite.status, InviteStatus::Pending);
    assert_eq!(invite.invitee_email, "bob@example.com");

    let pending = f.chat.pending_invites("bob@example.com").await.unwrap();
    assert_eq!(pending.len(), 1);

    let answered = f.chat.respond_to_invite(invite.id, true).await.unwrap();
    assert_eq!(answered.status, InviteStatus::Accepted);
    assert!(f.chat.pending_invites("bob@example.com").await.unwrap().is_empty());
}
