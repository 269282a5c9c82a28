//! Domain primitives for the coordination kernel: identifiers, agent
//! classes and capability-based authorization, the health (HP) model,
//! the trigger vocabulary, a pluggable clock, and the shared error
//! taxonomy. This crate has no I/O — everything here is a pure function
//! or a value type so it can be unit tested without a datastore.

pub mod agent;
pub mod auth;
pub mod clock;
pub mod error;
pub mod hp;
pub mod id;
#[cfg(feature = "test-support")]
pub mod test_support;
pub mod trigger;

pub use agent::{AgentClass, Capability, Liveness, Transport};
pub use auth::{authorize, AuthError, Command};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::KernelError;
pub use hp::{alerts_to_fire, hp_pct, AlertLevel, HealthState, HpMode};
pub use id::{
    AgentId, ClaimId, FenixId, IdGen, LogEntryId, MessageId, PlanId, SequentialIdGen, SignalId,
    TaskId, UuidIdGen,
};
pub use trigger::{scan as scan_triggers, Trigger};
