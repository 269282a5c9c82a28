//! Health (HP) model: per-turn token pressure reduced to a percentage
//! and a three-state health reading, plus the alert hysteresis that
//! keeps a single HP dip from paging lead twice.

use serde::{Deserialize, Serialize};

/// Where HP numbers come from for a given agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HpMode {
    /// The daemon computes HP from streamed provider telemetry.
    Daemon,
    /// The agent supplied `--hp` directly via `set_context`.
    SelfReported,
    /// No telemetry is available; HP is `unknown`, never a fabricated value.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Wounded,
    Critical,
}

impl HealthState {
    pub fn from_pct(pct: u32) -> Self {
        if pct > 50 {
            HealthState::Healthy
        } else if pct > 25 {
            HealthState::Wounded
        } else {
            HealthState::Critical
        }
    }
}

/// The two alert thresholds that may each fire once per descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertLevel {
    TwentyFive,
    Ten,
}

impl AlertLevel {
    pub fn threshold_pct(self) -> u32 {
        match self {
            AlertLevel::TwentyFive => 25,
            AlertLevel::Ten => 10,
        }
    }
}

/// Compute HP percentage from turn-scoped token counts and a context
/// denominator. Saturates at 0% used->100% remaining is impossible by
/// construction; `used` is clamped to `denom` so a single oversized turn
/// cannot drive the reading negative.
pub fn hp_pct(turn_input_tokens: u64, denom: u64) -> u32 {
    if denom == 0 {
        return 0;
    }
    let used = turn_input_tokens.min(denom);
    let used_pct = (used as f64 / denom as f64) * 100.0;
    (100.0 - used_pct).round().max(0.0) as u32
}

/// Given the previous set of fired alerts and a freshly computed HP
/// percentage, return the alerts that should fire *now* (i.e. newly
/// crossed on this call) and the updated fired-set to persist.
///
/// Alerts clear once HP rises back above 50%, per §4.I, so a subsequent
/// descent can re-fire them.
pub fn alerts_to_fire(
    previously_fired: &[AlertLevel],
    new_pct: u32,
) -> (Vec<AlertLevel>, Vec<AlertLevel>) {
    if new_pct > 50 {
        return (Vec::new(), Vec::new());
    }
    let mut fired = previously_fired.to_vec();
    let mut newly_fired = Vec::new();
    for level in [AlertLevel::TwentyFive, AlertLevel::Ten] {
        if new_pct <= level.threshold_pct() && !fired.contains(&level) {
            fired.push(level);
            newly_fired.push(level);
        }
    }
    (newly_fired, fired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_context_used_yields_zero_percent() {
        assert_eq!(hp_pct(200_000, 200_000), 0);
    }

    #[test]
    fn no_tokens_used_yields_full_health() {
        assert_eq!(hp_pct(0, 200_000), 100);
    }

    #[test]
    fn oversized_turn_saturates_rather_than_overflowing() {
        assert_eq!(hp_pct(500_000, 200_000), 0);
    }

    #[test]
    fn health_state_thresholds() {
        assert_eq!(HealthState::from_pct(100), HealthState::Healthy);
        assert_eq!(HealthState::from_pct(51), HealthState::Healthy);
        assert_eq!(HealthState::from_pct(50), HealthState::Wounded);
        assert_eq!(HealthState::from_pct(26), HealthState::Wounded);
        assert_eq!(HealthState::from_pct(25), HealthState::Critical);
        assert_eq!(HealthState::from_pct(0), HealthState::Critical);
    }

    #[test]
    fn alert_fires_once_per_descent() {
        let (fired, state) = alerts_to_fire(&[], 20);
        assert_eq!(fired, vec![AlertLevel::TwentyFive]);
        let (fired_again, state2) = alerts_to_fire(&state, 20);
        assert!(fired_again.is_empty());
        assert_eq!(state2, state);
    }

    #[test]
    fn both_alerts_fire_on_a_sharp_drop() {
        let (fired, _) = alerts_to_fire(&[], 5);
        assert_eq!(fired, vec![AlertLevel::TwentyFive, AlertLevel::Ten]);
    }

    #[test]
    fn alerts_clear_above_fifty_and_can_refire() {
        let (_, fired_low) = alerts_to_fire(&[], 10);
        let (cleared, state) = alerts_to_fire(&fired_low, 80);
        assert!(cleared.is_empty());
        assert!(state.is_empty());
        let (refired, _) = alerts_to_fire(&state, 24);
        assert_eq!(refired, vec![AlertLevel::TwentyFive]);
    }
}
