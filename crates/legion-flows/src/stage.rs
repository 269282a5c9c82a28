//! Resolved, in-memory flow/stage types. These are the product of
//! loading + inheritance-merging + validation; nothing downstream ever
//! sees the raw parsed document.

use indexmap::IndexMap;
use legion_core::AgentClass;
use serde::{Deserialize, Serialize};

/// A gate a transition must satisfy before it is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    SubmitResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub next: Option<String>,
    pub fail: Option<String>,
    #[serde(default)]
    pub requires: Vec<Requirement>,
    /// Per-requesting-class allow list of worker roles; `default` is the
    /// fallback bucket used when the caller's class has no dedicated entry.
    #[serde(default)]
    pub workers: IndexMap<String, Vec<AgentClass>>,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }

    /// Whether `class` may act as a worker of this stage.
    pub fn allows_worker(&self, class: AgentClass) -> bool {
        let classes = self
            .workers
            .get(class.as_str())
            .or_else(|| self.workers.get("default"));
        match classes {
            Some(list) => list.contains(&class),
            None => class == AgentClass::Lead,
        }
    }
}

/// A fully resolved (inheritance-merged) flow: a named graph of stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    pub initial_stage: String,
    pub stages: IndexMap<String, Stage>,
}

impl Flow {
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    pub fn is_valid_transition(&self, from: &str, to: &str) -> bool {
        self.stages
            .get(from)
            .map(|s| s.next.as_deref() == Some(to) || s.fail.as_deref() == Some(to))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, next: Option<&str>) -> Stage {
        Stage {
            name: name.to_string(),
            next: next.map(str::to_string),
            fail: None,
            requires: vec![],
            workers: IndexMap::new(),
        }
    }

    #[test]
    fn terminal_stage_has_no_next() {
        assert!(stage("closed", None).is_terminal());
        assert!(!stage("open", Some("assigned")).is_terminal());
    }

    #[test]
    fn worker_allow_list_falls_back_to_default_bucket() {
        let mut s = stage("in_progress", Some("fixed"));
        s.workers
            .insert("default".to_string(), vec![AgentClass::Coder]);
        assert!(s.allows_worker(AgentClass::Coder));
        assert!(!s.allows_worker(AgentClass::Builder));
    }

    #[test]
    fn worker_allow_list_defaults_to_lead_when_unspecified() {
        let s = stage("open", Some("assigned"));
        assert!(s.allows_worker(AgentClass::Lead));
        assert!(!s.allows_worker(AgentClass::Coder));
    }

    #[test]
    fn transition_validity_checks_next_and_fail_edges() {
        let mut stages = IndexMap::new();
        let mut open = stage("open", Some("assigned"));
        open.fail = Some("closed".to_string());
        stages.insert("open".to_string(), open);
        stages.insert("assigned".to_string(), stage("assigned", None));
        stages.insert("closed".to_string(), stage("closed", None));
        let flow = Flow {
            name: "t".to_string(),
            initial_stage: "open".to_string(),
            stages,
        };
        assert!(flow.is_valid_transition("open", "assigned"));
        assert!(flow.is_valid_transition("open", "closed"));
        assert!(!flow.is_valid_transition("open", "fixed"));
    }
}
