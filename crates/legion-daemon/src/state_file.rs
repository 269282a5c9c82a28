//! §4.K state file: the small JSON document each daemon keeps beside
//! itself so `start`/`stop`/`status` (and a crash) can tell what it was
//! doing without touching the shared datastore.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonState {
    pub pid: u32,
    pub status: String,
    pub updated_at_ms: i64,
    pub consecutive_failures: u32,
    pub resume_ready: bool,
}

pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// State files live under `state/<agent>.json`, the same content
    /// root layout every other module writes agent-addressed documents
    /// to.
    pub fn new(work_dir: &Path, agent: &str) -> Self {
        Self {
            path: work_dir.join("state").join(format!("{agent}.json")),
        }
    }

    pub fn write(&self, state: &DaemonState) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)
    }

    pub fn read(&self) -> std::io::Result<Option<DaemonState>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// The file-based circuit-breaker alert sink (§4.K, §7): a side channel
/// that survives even if the datastore itself is the cause of the
/// failure loop.
pub struct AlertSink {
    path: PathBuf,
}

impl AlertSink {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join("state").join("alerts.jsonl"),
        }
    }

    pub fn fire_poll_failure(&self, agent: &str, now_ms: i64, consecutive_failures: u32) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::json!({
            "kind": "poll_failure",
            "agent": agent,
            "at_ms": now_ms,
            "consecutive_failures": consecutive_failures,
        });
        let mut content = std::fs::read_to_string(&self.path).unwrap_or_default();
        content.push_str(&line.to_string());
        content.push('\n');
        std::fs::write(&self.path, content)
    }
}
