//! §4.K daemon runtime: the single-threaded cooperative poll loop each
//! `legiond` process runs for exactly one agent.

pub mod circuit_breaker;
pub mod config;
pub mod daemon;
pub mod rolling_buffer;
pub mod state_file;
pub mod usage_log;

pub use circuit_breaker::{CircuitBreaker, Trip};
pub use config::DaemonConfig;
pub use daemon::{Daemon, PollOutcome};
pub use rolling_buffer::RollingBuffer;
pub use state_file::{AlertSink, DaemonState, StateFile};
pub use usage_log::UsageLog;
