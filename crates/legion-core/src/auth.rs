//! Pure authorization: `(caller_class, command) -> allow | deny`.
//!
//! No dynamic dispatch, no lookup table stored anywhere mutable. A command
//! is gated by a `Capability` it requires, or (for lead-only operations
//! like `close_task`) by an explicit class allowlist. See the "duck-typed
//! agent objects" design note: this stays a pure function so it can be
//! unit tested exhaustively without a datastore.

use crate::agent::{AgentClass, Capability};

/// Every command in the external surface (§6), used only as an
/// authorization key — command *execution* lives in legion-storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Register,
    Deregister,
    Rename,
    Who,
    SetContext,
    SetStatus,
    ColdStart,
    FenixDown,
    UpdateHp,
    CheckActivity,
    CheckFreshness,
    Send,
    CheckInbox,
    PurgeInbox,
    GetHistory,
    ListTriggers,
    ClearMoonCrash,
    CreateTask,
    AssignTask,
    PullTask,
    UpdateTask,
    SubmitResult,
    CompletePhase,
    CloseTask,
    ReopenTask,
    GetTask,
    ListTasks,
    TaskLineage,
    ListFlows,
    ShowFlow,
    NextStatus,
    Transition,
    ClaimFile,
    ReleaseFile,
    ListClaims,
    SetPlan,
    GetPlan,
    UpdatePlanStatus,
    Log,
    GetLog,
    SpawnParty,
    StandDown,
    RetireAgent,
    Recruit,
    HandOffZone,
    Interrupt,
    Resume,
    ListCrews,
    PartyStatus,
    Sitrep,
    Poll,
    ListTools,
}

/// What a command requires to run.
#[derive(Debug, Clone, Copy)]
enum Gate {
    /// Allowed to any caller with this capability.
    Capability(Capability),
    /// Allowed only to the listed classes, regardless of capability.
    ClassOnly(&'static [AgentClass]),
    /// No gate: any registered caller may invoke it.
    Open,
}

impl Command {
    fn gate(self) -> Gate {
        use Command::*;
        match self {
            Register | Deregister | Rename | Who | CheckActivity | CheckFreshness | ListFlows
            | ShowFlow | GetTask | ListTasks | TaskLineage | ListClaims | GetPlan | GetLog
            | ListTriggers | ListCrews | PartyStatus | Sitrep | Poll | ListTools | CheckInbox
            | PurgeInbox | GetHistory | SetContext | SetStatus | ColdStart | FenixDown
            | ClaimFile | ReleaseFile | Send | PullTask | UpdateTask
            | SubmitResult | CompletePhase | SetPlan | Log | Interrupt | Resume | NextStatus => {
                Gate::Open
            }

            UpdateHp => Gate::Capability(Capability::HpWrite),
            ClearMoonCrash | AssignTask | SpawnParty | Recruit | HandOffZone | CreateTask
            | Transition => Gate::Capability(Capability::Manage),
            CloseTask | ReopenTask | RetireAgent | StandDown | UpdatePlanStatus => {
                Gate::ClassOnly(&[AgentClass::Lead])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("class {class} lacks required capability {capability:?}")]
    CapabilityMissing {
        class: AgentClass,
        capability: Capability,
    },
    #[error("class {class} is not permitted to run this command")]
    ClassDenied { class: AgentClass },
}

/// Authorize a caller of the given class to run `command`.
pub fn authorize(caller_class: AgentClass, command: Command) -> Result<(), AuthError> {
    match command.gate() {
        Gate::Open => Ok(()),
        Gate::Capability(cap) => {
            if caller_class.has_capability(cap) {
                Ok(())
            } else {
                Err(AuthError::CapabilityMissing {
                    class: caller_class,
                    capability: cap,
                })
            }
        }
        Gate::ClassOnly(classes) => {
            if classes.contains(&caller_class) {
                Ok(())
            } else {
                Err(AuthError::ClassDenied {
                    class: caller_class,
                }
            )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_can_close_task() {
        assert!(authorize(AgentClass::Lead, Command::CloseTask).is_ok());
    }

    #[test]
    fn coder_cannot_close_task() {
        assert!(matches!(
            authorize(AgentClass::Coder, Command::CloseTask),
            Err(AuthError::ClassDenied { .. })
        ));
    }

    #[test]
    fn daemon_hp_write_does_not_need_manage() {
        // A class with HpWrite but not Manage may still post telemetry.
        assert!(AgentClass::Coder.has_capability(Capability::Plan));
        assert!(!AgentClass::Coder.has_capability(Capability::Manage));
        assert!(matches!(
            authorize(AgentClass::Coder, Command::UpdateHp),
            Err(AuthError::CapabilityMissing { .. })
        ));
    }

    #[test]
    fn open_commands_allow_every_class() {
        for class in AgentClass::ALL {
            assert!(authorize(class, Command::Send).is_ok());
            assert!(authorize(class, Command::CheckInbox).is_ok());
        }
    }

    #[test]
    fn manage_capability_gates_assign_and_clear_moon_crash() {
        assert!(authorize(AgentClass::Lead, Command::AssignTask).is_ok());
        assert!(authorize(AgentClass::Coder, Command::AssignTask).is_err());
        assert!(authorize(AgentClass::Lead, Command::ClearMoonCrash).is_ok());
    }
}
