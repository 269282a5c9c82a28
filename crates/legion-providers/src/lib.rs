//! §4.J Provider abstraction: the daemon is provider-agnostic above this
//! line. A provider spawns a model subprocess, hands back a structured
//! event stream, and knows how to read its own usage and compaction
//! telemetry out of that stream; everything else lives in `legion-daemon`.

pub mod claude;
pub mod compaction;
pub mod provider;
pub mod usage;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use claude::ClaudeProvider;
pub use compaction::CompactionMarkers;
pub use provider::{
    Capabilities, ProviderError, ProviderEvent, ProviderHandle, ProviderSpawnConfig, UsageDelta,
};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProvider, ProviderCall};

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

/// The contract every model CLI is wrapped behind (§4.J). Implementors
/// hold no daemon-level state: rolling buffer, HP, and compaction
/// recovery all live above this trait.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Spawns the underlying subprocess and wires up the event channel
    /// that `read_stream` will later drain.
    async fn spawn(&self, config: ProviderSpawnConfig) -> Result<ProviderHandle, ProviderError>;

    async fn write_prompt(&self, handle: &ProviderHandle, text: &str)
        -> Result<(), ProviderError>;

    /// Takes ownership of `handle`'s event channel. Callable once per
    /// handle; the daemon drains it for the duration of the agent's life.
    fn read_stream(&self, handle: &ProviderHandle) -> Result<Receiver<ProviderEvent>, ProviderError>;

    /// Provider-specific: pulls whatever token counts this event carries.
    /// `None` fields mean "this event said nothing about usage", not zero.
    fn extract_usage(&self, event: &ProviderEvent) -> UsageDelta;

    /// Provider-specific: tests `event` against the loaded compaction
    /// marker contract document (§4.J, §4.K).
    fn detect_compaction(&self, event: &ProviderEvent) -> bool;

    fn capabilities(&self) -> Capabilities;

    /// Kills the subprocess backing `handle`, if one is still running.
    /// The default forwards to the kill closure `spawn` stashed on the
    /// handle, so providers with nothing to kill (e.g. `FakeProvider`)
    /// need not override this.
    fn kill(&self, handle: &ProviderHandle) {
        (handle.kill)()
    }
}
