//! Filesystem side of the "rebuildable index" design: message bodies,
//! task specs, results, plans, and log entries live on disk by reference
//! (§6 Persisted state layout); the SQLite file only ever stores the path.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ContentRoot(PathBuf);

impl ContentRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    pub fn root(&self) -> &Path {
        &self.0
    }

    pub fn inbox_file(&self, agent: &str, message_id: i64) -> PathBuf {
        self.0.join("inbox").join(agent).join(format!("{message_id}.md"))
    }

    pub fn task_file(&self, project: &str, slug: &str) -> PathBuf {
        self.0.join("tasks").join(project).join(format!("{slug}.md"))
    }

    pub fn result_file(&self, project: &str, slug: &str) -> PathBuf {
        self.0.join("results").join(project).join(format!("{slug}.md"))
    }

    pub fn battle_plan_file(&self, timestamp_ms: i64) -> PathBuf {
        self.0.join("battle-plans").join(format!("{timestamp_ms}.md"))
    }

    pub fn raid_log_file(&self, timestamp_ms: i64) -> PathBuf {
        self.0.join("raid-log").join(format!("{timestamp_ms}.md"))
    }

    pub fn agent_state_file(&self, agent: &str) -> PathBuf {
        self.0.join("state").join(format!("{agent}.json"))
    }

    pub fn write(&self, path: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    pub fn read(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_namespaced_by_kind() {
        let root = ContentRoot::new("/work");
        assert_eq!(
            root.inbox_file("coder-1", 42),
            Path::new("/work/inbox/coder-1/42.md")
        );
        assert_eq!(
            root.task_file("proj", "fix-bug"),
            Path::new("/work/tasks/proj/fix-bug.md")
        );
    }

    #[test]
    fn write_then_read_round_trips() {
        #![allow(clippy::unwrap_used)]
        let dir = tempfile::tempdir().unwrap();
        let root = ContentRoot::new(dir.path());
        let path = root.inbox_file("lead", 1);
        root.write(&path, "hello").unwrap();
        assert_eq!(root.read(&path).unwrap(), "hello");
    }
}
