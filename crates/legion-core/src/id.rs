//! Newtype identifier machinery shared by every domain type.

use std::fmt;

/// Short display form of an identifier: the last 8 characters, or the
/// whole string if shorter. Used in logs and terminal output where the
/// full UUID-derived id would be noise.
pub trait ShortId {
    fn short(&self) -> &str;
}

impl ShortId for str {
    fn short(&self) -> &str {
        if self.len() <= 8 {
            self
        } else {
            &self[self.len() - 8..]
        }
    }
}

/// Declares a newtype wrapper over `String` with the conversions every
/// identifier in this crate needs: construction, display, comparison
/// against bare strings, and serde passthrough.
macro_rules! define_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate(gen: &dyn crate::id::IdGen) -> Self {
                Self(gen.next_id(Self::PREFIX))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self) -> &str {
                crate::id::ShortId::short(self.0.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

pub(crate) use define_id;

define_id!(AgentId, "agent");
define_id!(MessageId, "msg");
define_id!(TaskId, "task");
define_id!(ClaimId, "claim");
define_id!(PlanId, "plan");
define_id!(LogEntryId, "log");
define_id!(FenixId, "fenix");
define_id!(SignalId, "sig");

/// Generator of fresh identifier strings; abstracted so tests can use a
/// deterministic sequence instead of random UUIDs.
pub trait IdGen: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

/// Production id generator: `<prefix>-<uuid-v4>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4())
    }
}

/// Deterministic id generator for tests: `<prefix>-<n>`.
#[derive(Debug, Default)]
pub struct SequentialIdGen {
    counter: std::sync::atomic::AtomicU64,
}

impl IdGen for SequentialIdGen {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("{prefix}-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_to_last_eight() {
        assert_eq!("0123456789abcdef".short(), "89abcdef");
    }

    #[test]
    fn short_id_keeps_short_strings_whole() {
        assert_eq!("abc".short(), "abc");
    }

    #[test]
    fn sequential_id_gen_is_deterministic_and_increasing() {
        let gen = SequentialIdGen::default();
        assert_eq!(gen.next_id("agent"), "agent-0");
        assert_eq!(gen.next_id("agent"), "agent-1");
    }

    #[test]
    fn agent_id_compares_against_str() {
        let id = AgentId::new("agent-abc");
        assert_eq!(id, *"agent-abc");
        assert_eq!(id.as_str(), "agent-abc");
    }
}
