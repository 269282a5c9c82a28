//! Shared setup every subcommand needs: which datastore to open, which
//! project scopes plans/tasks, and which identity/class is calling.
//! Each CLI invocation is a fresh process — there is no long-lived
//! client/daemon connection the way the ancestor CLI needed.

use legion_core::{AgentClass, SystemClock};
use legion_storage::Store;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{CliError, CliResult};

pub struct Cx {
    pub store: Store,
    pub project: String,
    pub caller: String,
    pub class: AgentClass,
}

impl Cx {
    pub fn open(
        db_path: &std::path::Path,
        work_dir: &std::path::Path,
        docs_dir: &std::path::Path,
        project: String,
        caller: String,
        class: AgentClass,
    ) -> CliResult<Self> {
        let store = Store::open(db_path, work_dir, docs_dir, Arc::new(SystemClock))?;
        Ok(Self {
            store,
            project,
            caller,
            class,
        })
    }
}

pub fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

pub fn parse_class(s: &str) -> CliResult<AgentClass> {
    AgentClass::parse(s).ok_or_else(|| CliError::Usage(format!("unknown agent class: {s}")))
}

pub fn default_work_dir(db_path: &std::path::Path) -> PathBuf {
    db_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
