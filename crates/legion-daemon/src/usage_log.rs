//! §4.I cost tracking: an append-only accounting log, separate from the
//! HP gauge, so historical cost survives even if a failure loop means
//! those same tokens must *not* be credited to cumulative HP. Grounded
//! in the teacher's `usage_metrics.rs` JSONL collector, simplified from a
//! polling background task to a direct append on every usage event,
//! since this daemon already has the per-turn deltas in hand instead of
//! needing to re-scan a session log file.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct UsageRecord<'a> {
    at_ms: i64,
    agent: &'a str,
    turn_input_tokens: u64,
    turn_output_tokens: u64,
    counted_toward_hp: bool,
}

pub struct UsageLog {
    path: PathBuf,
}

impl UsageLog {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join("state").join("usage.jsonl"),
        }
    }

    /// `counted_toward_hp` is `false` while the circuit breaker is
    /// tripped: the record still exists for cost accounting, but a
    /// reader reconstructing HP history must skip it.
    pub fn append(
        &self,
        agent: &str,
        at_ms: i64,
        turn_input_tokens: u64,
        turn_output_tokens: u64,
        counted_toward_hp: bool,
    ) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = UsageRecord {
            at_ms,
            agent,
            turn_input_tokens,
            turn_output_tokens,
            counted_toward_hp,
        };
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)
    }
}
