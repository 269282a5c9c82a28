//! Fixed trigger vocabulary scanned out of outgoing message content (§4.L).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    MoonCrash,
    StandDown,
    FenixDown,
    Sitrep,
    Rally,
    Retreat,
    HotZone,
    Recon,
}

impl Trigger {
    pub const ALL: [Trigger; 8] = [
        Trigger::MoonCrash,
        Trigger::StandDown,
        Trigger::FenixDown,
        Trigger::Sitrep,
        Trigger::Rally,
        Trigger::Retreat,
        Trigger::HotZone,
        Trigger::Recon,
    ];

    pub fn word(self) -> &'static str {
        match self {
            Trigger::MoonCrash => "moon_crash",
            Trigger::StandDown => "stand_down",
            Trigger::FenixDown => "fenix_down",
            Trigger::Sitrep => "sitrep",
            Trigger::Rally => "rally",
            Trigger::Retreat => "retreat",
            Trigger::HotZone => "hot_zone",
            Trigger::Recon => "recon",
        }
    }

    /// Triggers that flip a process-wide flag as a side effect of being
    /// observed in a sent message, versus ones that are merely recorded.
    pub fn is_active(self) -> bool {
        matches!(self, Trigger::MoonCrash | Trigger::StandDown)
    }
}

/// Scan message content for any trigger words, case-insensitively,
/// matched on whole-word boundaries so e.g. "reconnaissance" does not
/// spuriously match `recon`.
pub fn scan(content: &str) -> Vec<Trigger> {
    let lowered = content.to_ascii_lowercase();
    Trigger::ALL
        .into_iter()
        .filter(|t| word_present(&lowered, t.word()))
        .collect()
}

fn word_present(haystack: &str, word: &str) -> bool {
    let is_boundary = |c: Option<char>| !matches!(c, Some(c) if c.is_ascii_alphanumeric() || c == '_');
    let mut start = 0;
    while let Some(rel) = haystack[start..].find(word) {
        let idx = start + rel;
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + word.len()..].chars().next();
        if is_boundary(before) && is_boundary(after) {
            return true;
        }
        start = idx + word.len();
    }
    false
}
