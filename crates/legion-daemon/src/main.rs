//! `legiond`: one process per agent, running the poll loop in
//! [`legion_daemon::Daemon`] until `stand_down`, a retire record, or a
//! fatal datastore error.

use legion_core::{AgentClass, SystemClock};
use legion_daemon::{Daemon, DaemonConfig, PollOutcome};
use legion_providers::{ClaudeProvider, CompactionMarkers};
use legion_storage::Store;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let project = env_or("PROJECT", "default");
    let agent = env_or("AGENT_NAME", "unnamed-agent");
    let class = std::env::var("CALLER_CLASS")
        .ok()
        .and_then(|s| AgentClass::parse(&s))
        .unwrap_or(AgentClass::Coder);
    let db_path = PathBuf::from(env_or("DB_PATH", "minion.db"));
    let work_dir = db_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let docs_dir = PathBuf::from(env_or("DOCS_DIR", "docs"));

    let config = DaemonConfig::load(&docs_dir);
    let markers = CompactionMarkers::load(&docs_dir);
    let boot_rules_path = docs_dir.join("boot_rules.md");
    let boot_rules = std::fs::read_to_string(&boot_rules_path)
        .unwrap_or_else(|_| "Follow your mission. Stay within your claimed files.".to_string());

    let store = match Store::open(&db_path, &work_dir, &docs_dir, Arc::new(SystemClock)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to open datastore");
            return ExitCode::FAILURE;
        }
    };

    let provider = ClaudeProvider::new(markers);
    let mut daemon = Daemon::new(store, provider, agent.clone(), class, project, config, work_dir, boot_rules);

    if let Err(e) = daemon.boot(None) {
        tracing::error!(error = %e, agent = %agent, "boot sequence failed");
        return ExitCode::FAILURE;
    }
    tracing::info!(agent = %agent, class = %class, "booted");

    loop {
        match daemon.poll_once().await {
            Ok(PollOutcome::GracefulExit) => {
                return ExitCode::from(3);
            }
            Ok(PollOutcome::Idle { sleep_for_ms }) => {
                tokio::time::sleep(std::time::Duration::from_millis(sleep_for_ms)).await;
            }
            Ok(PollOutcome::Worked { succeeded: true }) => {}
            Ok(PollOutcome::Worked { succeeded: false }) => {
                tokio::time::sleep(daemon.failure_backoff()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, agent = %agent, "datastore error in poll loop, exiting");
                return ExitCode::FAILURE;
            }
        }
    }
}
