//! Chat orchestration: the stateful coordinator behind the chat screen.
//!
//! [`ChatOrchestrator`] owns the active workspace, its sessions and files,
//! and drives the send pipeline through the gateway, the extractor and the
//! LLM client.

pub mod location;
pub mod notify;
pub mod orchestrator;
pub mod ordering;

pub use notify::{Notification, NotificationKind};
pub use orchestrator::ChatOrchestrator;

/// Lifecycle of the active workspace.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WorkspacePhase {
    /// No workspace selected.
    #[default]
    Idle,
    /// Sessions and files are being fetched.
    Loading,
    /// Sessions and files are available.
    Ready,
}

/// Long-running operation currently in flight.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Activity {
    /// Fetching a workspace's sessions and files.
    LoadingWorkspace,
    /// Running the send pipeline.
    Sending,
    /// Uploading a file.
    Uploading,
    /// Extracting a file for preview.
    LoadingFileContent,
}

#[cfg(test)]
mod tests;
