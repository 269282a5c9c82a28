//! §4.J/§4.K compaction markers: the substrings that tell the daemon a
//! provider just compacted its own context window out from under it.
//! Loaded from a contract document under `DOCS_DIR` so no single
//! provider's wording is ever hard-coded into the kernel (§7).

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct MarkersDoc {
    #[serde(default)]
    markers: Vec<String>,
}

/// The loaded (or default) set of compaction markers for a provider.
#[derive(Debug, Clone)]
pub struct CompactionMarkers {
    markers: Vec<String>,
}

impl CompactionMarkers {
    /// A conservative built-in fallback so a daemon can boot with an
    /// empty `DOCS_DIR`: these are the markers Claude's CLI itself emits.
    pub fn defaults() -> Self {
        Self {
            markers: vec![
                "context low".to_string(),
                "conversation compacted".to_string(),
                "auto-compact".to_string(),
            ],
        }
    }

    /// Loads `compaction_markers.toml` from `docs_dir`. A missing or
    /// malformed file falls back to [`CompactionMarkers::defaults`] and
    /// logs a warning, matching the rest of the kernel's contract-document
    /// loading discipline.
    pub fn load(docs_dir: &Path) -> Self {
        let path = docs_dir.join("compaction_markers.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::defaults(),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read compaction markers, using defaults");
                return Self::defaults();
            }
        };
        match toml::from_str::<MarkersDoc>(&content) {
            Ok(doc) if !doc.markers.is_empty() => Self { markers: doc.markers },
            Ok(_) => {
                tracing::warn!(path = %path.display(), "compaction markers document has no entries, using defaults");
                Self::defaults()
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "malformed compaction markers document, using defaults");
                Self::defaults()
            }
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.markers.iter().any(|m| lower.contains(&m.to_lowercase()))
    }
}
