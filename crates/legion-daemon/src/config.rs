//! §4.N contract-document-driven numeric tunables. A daemon must be able
//! to boot with an empty `DOCS_DIR`: every field falls back to the
//! compiled-in default (§6) and a missing/malformed document only logs a
//! warning, matching `legion_flows::FlowRegistry::load_dir` and
//! `legion_providers::CompactionMarkers::load`.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct DaemonConfig {
    pub max_rolling_history_tokens: u64,
    pub max_prompt_chars: usize,
    pub no_output_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub default_context_window: u64,
    pub poll_interval_min: Duration,
    pub poll_interval_max: Duration,
    pub circuit_breaker_threshold: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_rolling_history_tokens: 100_000,
            max_prompt_chars: 120_000,
            no_output_timeout: Duration::from_secs(600),
            backoff_initial: Duration::from_secs(30),
            backoff_max: Duration::from_secs(300),
            default_context_window: 200_000,
            poll_interval_min: Duration::from_secs(1),
            poll_interval_max: Duration::from_secs(30),
            circuit_breaker_threshold: 3,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDoc {
    max_rolling_history_tokens: Option<u64>,
    max_prompt_chars: Option<usize>,
    no_output_timeout_secs: Option<u64>,
    backoff_initial_secs: Option<u64>,
    backoff_max_secs: Option<u64>,
    default_context_window: Option<u64>,
    poll_interval_min_secs: Option<u64>,
    poll_interval_max_secs: Option<u64>,
    circuit_breaker_threshold: Option<u32>,
}

impl DaemonConfig {
    /// Loads `config_defaults.toml` from `docs_dir`, layering overrides on
    /// top of [`DaemonConfig::default`]. Per-field: a missing document
    /// keeps the default for every field; an unset field inside a present
    /// document also keeps its own default.
    pub fn load(docs_dir: &Path) -> Self {
        let path = docs_dir.join("config_defaults.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read config defaults, using compiled-in values");
                return Self::default();
            }
        };
        let doc: ConfigDoc = match toml::from_str(&content) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "malformed config defaults document, using compiled-in values");
                return Self::default();
            }
        };

        let base = Self::default();
        Self {
            max_rolling_history_tokens: doc
                .max_rolling_history_tokens
                .unwrap_or(base.max_rolling_history_tokens),
            max_prompt_chars: doc.max_prompt_chars.unwrap_or(base.max_prompt_chars),
            no_output_timeout: doc
                .no_output_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(base.no_output_timeout),
            backoff_initial: doc
                .backoff_initial_secs
                .map(Duration::from_secs)
                .unwrap_or(base.backoff_initial),
            backoff_max: doc
                .backoff_max_secs
                .map(Duration::from_secs)
                .unwrap_or(base.backoff_max),
            default_context_window: doc
                .default_context_window
                .unwrap_or(base.default_context_window),
            poll_interval_min: doc
                .poll_interval_min_secs
                .map(Duration::from_secs)
                .unwrap_or(base.poll_interval_min),
            poll_interval_max: doc
                .poll_interval_max_secs
                .map(Duration::from_secs)
                .unwrap_or(base.poll_interval_max),
            circuit_breaker_threshold: doc
                .circuit_breaker_threshold
                .unwrap_or(base.circuit_breaker_threshold),
        }
    }
}
