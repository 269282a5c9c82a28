//! Deterministic builders shared by other crates' test suites.
//! Only compiled with `--features test-support`.

use crate::clock::{Clock, FakeClock};
use crate::id::SequentialIdGen;

/// A clock frozen at a fixed epoch plus a deterministic id generator,
/// bundled together since almost every integration test needs both.
pub struct TestHarnessClock {
    pub clock: FakeClock,
    pub ids: SequentialIdGen,
}

impl Default for TestHarnessClock {
    fn default() -> Self {
        Self {
            clock: FakeClock::new(1_700_000_000_000),
            ids: SequentialIdGen::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdGen;

    #[test]
    fn harness_clock_starts_at_fixed_epoch() {
        let h = TestHarnessClock::default();
        assert_eq!(h.clock.now_ms(), 1_700_000_000_000);
        assert_eq!(h.ids.next_id("agent"), "agent-0");
    }
}
