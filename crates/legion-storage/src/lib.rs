//! The shared datastore every legion process opens directly: SQLite as
//! an accelerated, rebuildable index, with message/task/plan/log bodies
//! held on the filesystem by reference (§4.A).

pub mod agents;
pub mod claims;
pub mod content;
pub mod error;
pub mod fenix;
pub mod flags;
pub mod flow_ops;
pub mod messaging;
pub mod schema;
pub mod signals;
pub mod store;
pub mod tasks;
pub mod warroom;

pub use agents::AgentRecord;
pub use claims::{ClaimResult, FileClaim};
pub use content::ContentRoot;
pub use error::{StoreError, StoreResult};
pub use fenix::{ColdStartBriefing, FenixRecord};
pub use flow_ops::NextStatus;
pub use messaging::Message;
pub use signals::{AgentSignal, SignalKind};
pub use store::Store;
pub use tasks::{Task, TaskHistoryEntry};
pub use warroom::{LogEntry, Plan};
