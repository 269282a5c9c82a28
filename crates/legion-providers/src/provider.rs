//! Shared provider types: spawn config, handle, events, errors, and the
//! static capability flags the daemon reads once at boot.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::Receiver;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("stream already taken for this handle")]
    StreamTaken,
    #[error("stream timed out")]
    StreamTimeout,
    #[error("rate limited: {0}")]
    RateLimited(String),
}

/// Configuration for spawning a new provider-backed agent process.
#[derive(Debug, Clone)]
pub struct ProviderSpawnConfig {
    pub agent_id: String,
    pub agent_class: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub workspace_path: PathBuf,
    pub project_root: PathBuf,
    /// `Some` when resuming a prior session (`supports_resume` capability).
    pub resume_session_id: Option<String>,
    pub provider_config: HashMap<String, serde_json::Value>,
}

/// Handle to a running provider-backed process. The event channel is
/// handed off exactly once via [`crate::Provider::read_stream`]; `spawn`
/// stashes it here so the trait can stay handle-shaped rather than
/// returning a stream directly.
#[derive(Clone)]
pub struct ProviderHandle {
    pub agent_id: String,
    pub session_id: String,
    pub workspace_path: PathBuf,
    pub(crate) receiver: Arc<Mutex<Option<Receiver<ProviderEvent>>>>,
    /// Kills the backing subprocess, if any is still running. Idempotent;
    /// a no-op for providers (e.g. `FakeProvider`) with nothing to kill.
    pub(crate) kill: Arc<dyn Fn() + Send + Sync>,
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("agent_id", &self.agent_id)
            .field("session_id", &self.session_id)
            .field("workspace_path", &self.workspace_path)
            .finish_non_exhaustive()
    }
}

impl ProviderHandle {
    pub fn new(
        agent_id: String,
        session_id: String,
        workspace_path: PathBuf,
        receiver: Receiver<ProviderEvent>,
    ) -> Self {
        Self::with_kill(agent_id, session_id, workspace_path, receiver, Arc::new(|| {}))
    }

    pub fn with_kill(
        agent_id: String,
        session_id: String,
        workspace_path: PathBuf,
        receiver: Receiver<ProviderEvent>,
        kill: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            agent_id,
            session_id,
            workspace_path,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            kill,
        }
    }

    pub(crate) fn take_receiver(&self) -> Result<Receiver<ProviderEvent>, ProviderError> {
        self.receiver.lock().take().ok_or(ProviderError::StreamTaken)
    }
}

/// One structured unit of a provider's streamed output. `raw` is the
/// provider's own JSON record, kept around so `extract_usage` and
/// `detect_compaction` can read provider-specific fields without this
/// type knowing what they are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub text: String,
    pub raw: serde_json::Value,
}

impl ProviderEvent {
    pub fn new(text: impl Into<String>, raw: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            raw,
        }
    }
}

/// Per-event usage telemetry. `None` means the event carried no usage
/// data at all, not that the value was zero (§4.I depends on the
/// distinction: a non-usage event must not reset HP math).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub turn_input_tokens: Option<u64>,
    pub turn_output_tokens: Option<u64>,
    pub context_window: Option<u64>,
}

/// Static facts about a provider, read once at daemon boot (§4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_read_outside_project: bool,
    pub shell_sandbox: bool,
    pub default_context_window: u64,
    pub supports_resume: bool,
}
