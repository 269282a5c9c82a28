//! Agent identity, class, and capability-based authorization.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A role bundle. Classes are fixed, not user-extensible: the authorization
/// model depends on every caller falling into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentClass {
    Lead,
    Coder,
    Builder,
    Oracle,
    Recon,
    Planner,
    Auditor,
}

impl AgentClass {
    pub const ALL: [AgentClass; 7] = [
        AgentClass::Lead,
        AgentClass::Coder,
        AgentClass::Builder,
        AgentClass::Oracle,
        AgentClass::Recon,
        AgentClass::Planner,
        AgentClass::Auditor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentClass::Lead => "lead",
            AgentClass::Coder => "coder",
            AgentClass::Builder => "builder",
            AgentClass::Oracle => "oracle",
            AgentClass::Recon => "recon",
            AgentClass::Planner => "planner",
            AgentClass::Auditor => "auditor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// How long this class's `context_updated_at` may go stale before
    /// sends are blocked (§4.C).
    pub fn staleness_window(self) -> Duration {
        match self {
            AgentClass::Lead => Duration::from_secs(15 * 60),
            AgentClass::Oracle => Duration::from_secs(30 * 60),
            _ => Duration::from_secs(5 * 60),
        }
    }

    /// The fixed capability set granted to this class.
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            AgentClass::Lead => &[
                Capability::Manage,
                Capability::Code,
                Capability::Build,
                Capability::Review,
                Capability::Test,
                Capability::Investigate,
                Capability::Plan,
            ],
            AgentClass::Coder => &[Capability::Code, Capability::Plan],
            AgentClass::Builder => &[Capability::Build],
            AgentClass::Oracle => &[Capability::Review, Capability::Investigate],
            AgentClass::Recon => &[Capability::Investigate],
            AgentClass::Planner => &[Capability::Plan],
            AgentClass::Auditor => &[Capability::Review, Capability::Test],
        }
    }

    pub fn has_capability(self, cap: Capability) -> bool {
        self.capabilities().contains(&cap)
    }
}

impl std::fmt::Display for AgentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named permission. Commands are gated by one of these, never by class
/// directly, so that a new class can be slotted in without touching every
/// call site (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Manage,
    Code,
    Build,
    Review,
    Test,
    Investigate,
    Plan,
    /// HP telemetry writes are split out from `Manage` so a daemon acting on
    /// an agent's behalf never needs lead-equivalent authority to post a
    /// health update. See the "privilege leakage" design note.
    HpWrite,
}

/// Liveness derived from `last_seen`, independent of HP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Active,
    Idle,
    Dead,
}

impl Liveness {
    pub fn from_idle_duration(idle: Duration) -> Self {
        if idle < Duration::from_secs(120) {
            Liveness::Active
        } else if idle < Duration::from_secs(600) {
            Liveness::Idle
        } else {
            Liveness::Dead
        }
    }
}

/// Where an agent's process lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Daemon,
    Terminal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_has_every_capability() {
        for cap in [
            Capability::Manage,
            Capability::Code,
            Capability::Build,
            Capability::Review,
            Capability::Test,
            Capability::Investigate,
            Capability::Plan,
        ] {
            assert!(AgentClass::Lead.has_capability(cap));
        }
    }

    #[test]
    fn recon_has_only_investigate() {
        assert!(AgentClass::Recon.has_capability(Capability::Investigate));
        assert!(!AgentClass::Recon.has_capability(Capability::Code));
    }

    #[test]
    fn staleness_windows_match_class() {
        assert_eq!(
            AgentClass::Lead.staleness_window(),
            Duration::from_secs(900)
        );
        assert_eq!(
            AgentClass::Oracle.staleness_window(),
            Duration::from_secs(1800)
        );
        assert_eq!(
            AgentClass::Coder.staleness_window(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn liveness_thresholds() {
        assert_eq!(
            Liveness::from_idle_duration(Duration::from_secs(30)),
            Liveness::Active
        );
        assert_eq!(
            Liveness::from_idle_duration(Duration::from_secs(300)),
            Liveness::Idle
        );
        assert_eq!(
            Liveness::from_idle_duration(Duration::from_secs(3600)),
            Liveness::Dead
        );
    }

    #[test]
    fn class_round_trips_through_str() {
        for class in AgentClass::ALL {
            assert_eq!(AgentClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(AgentClass::parse("nonexistent"), None);
    }
}
