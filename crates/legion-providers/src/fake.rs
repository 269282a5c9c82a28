//! Fake provider for deterministic daemon tests. Grounded in the
//! teacher's `FakeAgentAdapter`: records every call and lets a test
//! script the events a spawned agent "streams" back.

use crate::provider::{
    Capabilities, ProviderError, ProviderEvent, ProviderHandle, ProviderSpawnConfig, UsageDelta,
};
use crate::usage::extract_usage_from_json;
use crate::Provider;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum ProviderCall {
    Spawn { agent_id: String },
    WritePrompt { agent_id: String, text: String },
}

struct FakeProviderState {
    calls: Vec<ProviderCall>,
    scripted_events: HashMap<String, Vec<ProviderEvent>>,
    senders: HashMap<String, mpsc::Sender<ProviderEvent>>,
    spawn_error: Option<String>,
    compaction_marker: Option<String>,
    capabilities: Capabilities,
}

/// A provider double that never shells out: agents are scripted with
/// `push_event`, and `spawn`/`write_prompt` calls are recorded for
/// assertions.
#[derive(Clone)]
pub struct FakeProvider {
    inner: Arc<Mutex<FakeProviderState>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProviderState {
                calls: Vec::new(),
                scripted_events: HashMap::new(),
                senders: HashMap::new(),
                spawn_error: None,
                compaction_marker: None,
                capabilities: Capabilities {
                    can_read_outside_project: false,
                    shell_sandbox: false,
                    default_context_window: 200_000,
                    supports_resume: true,
                },
            })),
        }
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.inner.lock().calls.clone()
    }

    pub fn set_spawn_error(&self, error: impl Into<String>) {
        self.inner.lock().spawn_error = Some(error.into());
    }

    /// Marks a single substring as "this text means the fake context
    /// compacted", so `detect_compaction` tests can exercise the daemon's
    /// recovery path without a real contract document.
    pub fn set_compaction_marker(&self, marker: impl Into<String>) {
        self.inner.lock().compaction_marker = Some(marker.into());
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.inner.lock().capabilities = capabilities;
    }

    /// Queues an event to be delivered the next time `agent_id`'s stream
    /// is read. Call before `spawn` or it is dropped silently (no agent
    /// to deliver to yet); call again after `spawn` to push mid-turn.
    pub async fn push_event(&self, agent_id: &str, event: ProviderEvent) {
        let sender = self.inner.lock().senders.get(agent_id).cloned();
        match sender {
            Some(tx) => {
                let _ = tx.send(event).await;
            }
            None => {
                self.inner
                    .lock()
                    .scripted_events
                    .entry(agent_id.to_string())
                    .or_default()
                    .push(event);
            }
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn spawn(&self, config: ProviderSpawnConfig) -> Result<ProviderHandle, ProviderError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ProviderCall::Spawn {
            agent_id: config.agent_id.clone(),
        });
        if let Some(error) = inner.spawn_error.take() {
            return Err(ProviderError::SpawnFailed(error));
        }

        let (tx, rx) = mpsc::channel(64);
        for queued in inner.scripted_events.remove(&config.agent_id).unwrap_or_default() {
            let _ = tx.try_send(queued);
        }
        inner.senders.insert(config.agent_id.clone(), tx);

        Ok(ProviderHandle::new(
            config.agent_id.clone(),
            config.agent_id,
            config.workspace_path,
            rx,
        ))
    }

    async fn write_prompt(
        &self,
        handle: &ProviderHandle,
        text: &str,
    ) -> Result<(), ProviderError> {
        self.inner.lock().calls.push(ProviderCall::WritePrompt {
            agent_id: handle.agent_id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn read_stream(
        &self,
        handle: &ProviderHandle,
    ) -> Result<mpsc::Receiver<ProviderEvent>, ProviderError> {
        handle.take_receiver()
    }

    fn extract_usage(&self, event: &ProviderEvent) -> UsageDelta {
        extract_usage_from_json(event)
    }

    fn detect_compaction(&self, event: &ProviderEvent) -> bool {
        self.inner
            .lock()
            .compaction_marker
            .as_deref()
            .is_some_and(|m| event.text.contains(m))
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.lock().capabilities
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn config(agent_id: &str) -> ProviderSpawnConfig {
        ProviderSpawnConfig {
            agent_id: agent_id.to_string(),
            agent_class: "coder".to_string(),
            command: "fake".to_string(),
            args: vec![],
            env: vec![],
            workspace_path: PathBuf::from("."),
            project_root: PathBuf::from("."),
            resume_session_id: None,
            provider_config: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn scripted_events_queued_before_spawn_are_delivered() {
        let provider = FakeProvider::new();
        provider
            .push_event("coder-1", ProviderEvent::new("hi", json!({})))
            .await;
        let handle = provider.spawn(config("coder-1")).await.unwrap();
        let mut rx = provider.read_stream(&handle).unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.text, "hi");
    }

    #[tokio::test]
    async fn spawn_error_is_returned_exactly_once() {
        let provider = FakeProvider::new();
        provider.set_spawn_error("boom");
        assert!(provider.spawn(config("coder-1")).await.is_err());
        assert!(provider.spawn(config("coder-1")).await.is_ok());
    }

    #[tokio::test]
    async fn compaction_marker_is_detected_on_matching_text() {
        let provider = FakeProvider::new();
        provider.set_compaction_marker("context low");
        let event = ProviderEvent::new("context low, compacting", json!({}));
        assert!(provider.detect_compaction(&event));
    }

    #[tokio::test]
    async fn write_prompt_is_recorded() {
        let provider = FakeProvider::new();
        let handle = provider.spawn(config("coder-1")).await.unwrap();
        provider.write_prompt(&handle, "go fix it").await.unwrap();
        assert!(matches!(
            provider.calls().as_slice(),
            [ProviderCall::Spawn { .. }, ProviderCall::WritePrompt { text, .. }]
                if text == "go fix it"
        ));
    }
}
