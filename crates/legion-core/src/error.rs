//! Error taxonomy shared across crates (§7). Every precondition failure
//! carries the rule that fired, the observed state, and a remediation
//! hint, per the "user-visible failure behavior" requirement — never a
//! bare variant name.

use crate::agent::AgentClass;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("context stale: last updated {age_secs}s ago (limit {limit_secs}s) -> run set_context")]
    StaleContext { age_secs: u64, limit_secs: u64 },

    #[error("unread inbox: {unread} message(s) pending -> run check_inbox")]
    UnreadInbox { unread: u64 },

    #[error("no active plan for this project -> run set_plan")]
    NoActivePlan,

    #[error("moon_crash is active -> only lead may send, or clear_moon_crash")]
    MoonCrash,

    #[error("task already pulled by another agent")]
    AlreadyPulled,

    #[error("task is blocked by {count} unclosed task(s)")]
    BlockedBy { count: u64 },

    #[error("file already claimed by {holder}")]
    ClaimHeld { holder: String },

    #[error("result_file is required before this transition -> run submit_result")]
    MissingResult,

    #[error("invalid transition from {from} to {to} for flow {flow}")]
    InvalidTransition {
        flow: String,
        from: String,
        to: String,
    },

    #[error("class {class} may not act as a worker of stage {stage}")]
    WorkerClassMismatch { class: AgentClass, stage: String },

    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("class {class} lacks a required capability for this command")]
    CapabilityMissing { class: AgentClass },

    #[error("class {class} is not permitted to run this command")]
    ClassDenied { class: AgentClass },

    #[error("datastore conflict, retried {retries} time(s)")]
    Conflict { retries: u32 },

    #[error("datastore corruption detected: {0}")]
    Corruption(String),
}

impl KernelError {
    /// A stable, machine-readable exit code per §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            KernelError::CapabilityMissing { .. } | KernelError::ClassDenied { .. } => 4,
            KernelError::StaleContext { .. }
            | KernelError::UnreadInbox { .. }
            | KernelError::NoActivePlan
            | KernelError::MoonCrash
            | KernelError::AlreadyPulled
            | KernelError::BlockedBy { .. }
            | KernelError::ClaimHeld { .. }
            | KernelError::MissingResult
            | KernelError::InvalidTransition { .. }
            | KernelError::WorkerClassMismatch { .. }
            | KernelError::UnknownRecipient(_)
            | KernelError::NotFound(_) => 2,
            KernelError::Conflict { .. } | KernelError::Corruption(_) => 1,
        }
    }
}

impl From<crate::auth::AuthError> for KernelError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::CapabilityMissing { class, .. } => {
                KernelError::CapabilityMissing { class }
            }
            crate::auth::AuthError::ClassDenied { class } => KernelError::ClassDenied { class },
        }
    }
}
