//! §4.K circuit breaker: counts consecutive failed invocations *for the
//! same payload* (same set of message ids), trips a `PollFailure` alert
//! after a threshold, and backs the daemon off exponentially. Token
//! usage observed during a failure loop must never reach the cumulative
//! HP counters — callers enforce that by not calling `update_hp` on the
//! failure path, not by anything in here.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trip {
    /// Stay within budget; keep polling at the normal cadence.
    Ok,
    /// Threshold just crossed this call: fire the side-channel alert now.
    JustTripped,
    /// Already tripped on a prior call: back off, don't re-alert.
    StillTripped,
}

pub struct CircuitBreaker {
    threshold: u32,
    backoff_initial: Duration,
    backoff_max: Duration,
    consecutive_failures: u32,
    last_payload: Option<Vec<String>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, backoff_initial: Duration, backoff_max: Duration) -> Self {
        Self {
            threshold,
            backoff_initial,
            backoff_max,
            consecutive_failures: 0,
            last_payload: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Call on a successful invocation: resets the streak.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_payload = None;
    }

    /// Call on a failed invocation for `payload` (the message ids this
    /// turn attempted to process). Only counts as a *consecutive*
    /// failure when the payload is identical to the last failure; a
    /// differently-shaped payload starts a fresh streak.
    pub fn record_failure(&mut self, payload: &[String]) -> Trip {
        let same_payload = self.last_payload.as_deref() == Some(payload);
        if same_payload {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 1;
            self.last_payload = Some(payload.to_vec());
        }

        if self.consecutive_failures < self.threshold {
            Trip::Ok
        } else if self.consecutive_failures == self.threshold {
            Trip::JustTripped
        } else {
            Trip::StillTripped
        }
    }

    /// Exponential back-off keyed off the failure streak, capped at
    /// `backoff_max`.
    pub fn backoff(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let shift = (self.consecutive_failures - 1).min(16);
        let scaled = self.backoff_initial.as_millis().saturating_mul(1u128 << shift);
        Duration::from_millis(scaled.min(self.backoff_max.as_millis()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_exactly_at_the_threshold() {
        let mut cb = CircuitBreaker::new(3, Duration::from_secs(30), Duration::from_secs(300));
        let payload = vec!["m1".to_string()];
        assert_eq!(cb.record_failure(&payload), Trip::Ok);
        assert_eq!(cb.record_failure(&payload), Trip::Ok);
        assert_eq!(cb.record_failure(&payload), Trip::JustTripped);
        assert_eq!(cb.record_failure(&payload), Trip::StillTripped);
    }

    #[test]
    fn a_different_payload_resets_the_streak() {
        let mut cb = CircuitBreaker::new(3, Duration::from_secs(30), Duration::from_secs(300));
        cb.record_failure(&["m1".to_string()]);
        cb.record_failure(&["m1".to_string()]);
        assert_eq!(cb.record_failure(&["m2".to_string()]), Trip::Ok);
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[test]
    fn success_clears_the_streak() {
        let mut cb = CircuitBreaker::new(3, Duration::from_secs(30), Duration::from_secs(300));
        cb.record_failure(&["m1".to_string()]);
        cb.record_success();
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn backoff_doubles_and_saturates_at_max() {
        let mut cb = CircuitBreaker::new(3, Duration::from_secs(30), Duration::from_secs(300));
        let payload = vec!["m1".to_string()];
        cb.record_failure(&payload);
        assert_eq!(cb.backoff(), Duration::from_secs(30));
        cb.record_failure(&payload);
        assert_eq!(cb.backoff(), Duration::from_secs(60));
        for _ in 0..10 {
            cb.record_failure(&payload);
        }
        assert_eq!(cb.backoff(), Duration::from_secs(300));
    }
}
