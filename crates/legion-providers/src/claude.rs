//! The Claude CLI provider: spawns `claude --output-format stream-json`
//! as a subprocess and turns its stdout into a channel of
//! [`ProviderEvent`]s. Subprocess handling follows the teacher's
//! `subprocess.rs` helper (timeouts around `tokio::process::Command`,
//! relying on the tokio `Child` drop impl to reap a timed-out child)
//! rather than the tmux-session machinery the teacher uses elsewhere,
//! since this provider talks to its child over stdio, not a terminal.

use crate::compaction::CompactionMarkers;
use crate::provider::{
    Capabilities, ProviderError, ProviderEvent, ProviderHandle, ProviderSpawnConfig, UsageDelta,
};
use crate::usage::extract_usage_from_json;
use crate::Provider;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Default channel depth for a single turn's event stream. Generous
/// enough that a fast-talking model never blocks on a slow consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct ClaudeProvider {
    markers: CompactionMarkers,
    default_context_window: u64,
}

impl ClaudeProvider {
    pub fn new(markers: CompactionMarkers) -> Self {
        Self {
            markers,
            default_context_window: 200_000,
        }
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    async fn spawn(&self, config: ProviderSpawnConfig) -> Result<ProviderHandle, ProviderError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .arg("--output-format")
            .arg("stream-json")
            .current_dir(&config.project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for (k, v) in &config.env {
            cmd.env(k, v);
        }
        if let Some(session_id) = &config.resume_session_id {
            cmd.arg("--resume").arg(session_id);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProviderError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::SpawnFailed("no stdout pipe".to_string()))?;

        // Held outside the reading task so `kill()` can reach the child
        // from the handle while the task is still draining stdout.
        let child = Arc::new(Mutex::new(Some(child)));
        let child_for_task = child.clone();
        let child_for_kill = child.clone();

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let raw: serde_json::Value =
                            serde_json::from_str(&line).unwrap_or(serde_json::Value::Null);
                        let text = raw
                            .get("message")
                            .and_then(|m| m.get("content"))
                            .and_then(|c| c.as_array())
                            .and_then(|blocks| blocks.first())
                            .and_then(|b| b.get("text"))
                            .and_then(|t| t.as_str())
                            .unwrap_or(&line)
                            .to_string();
                        if tx.send(ProviderEvent::new(text, raw)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "claude provider stdout read failed");
                        break;
                    }
                }
            }
            let taken = child_for_task.lock().take();
            if let Some(mut child) = taken {
                let _ = child.wait().await;
            }
        });

        let kill = Arc::new(move || {
            if let Some(child) = child_for_kill.lock().as_mut() {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(error = %e, "failed to kill provider subprocess");
                }
            }
        });

        let session_id = config
            .resume_session_id
            .clone()
            .unwrap_or_else(|| config.agent_id.clone());
        Ok(ProviderHandle::with_kill(
            config.agent_id,
            session_id,
            config.workspace_path,
            rx,
            kill,
        ))
    }

    async fn write_prompt(
        &self,
        _handle: &ProviderHandle,
        _text: &str,
    ) -> Result<(), ProviderError> {
        // Claude's stream-json CLI takes its prompt on the initial argv,
        // not over stdin after spawn; a resumed turn re-spawns with
        // `--resume` instead. Nothing to write here.
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
        self.markers.matches(&event.text)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_read_outside_project: false,
            shell_sandbox: true,
            default_context_window: self.default_context_window,
            supports_resume: true,
        }
    }
}
