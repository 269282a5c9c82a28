//! Parses per-turn token usage out of a JSONL-streaming provider's
//! structured events. Grounded in the teacher's `usage_metrics.rs`
//! session-log scraper: only `type: "assistant"` records carry a
//! `message.usage` block, and the fields come back as bare integers.

use crate::provider::{ProviderEvent, UsageDelta};

/// Reads `message.usage.{input_tokens,output_tokens}` and a top-level
/// `context_window` hint (not every provider reports one) out of a
/// single streamed JSON event.
pub fn extract_usage_from_json(event: &ProviderEvent) -> UsageDelta {
    let mut delta = UsageDelta::default();

    if event.raw.get("type").and_then(|v| v.as_str()) != Some("assistant") {
        return delta;
    }
    let Some(message) = event.raw.get("message") else {
        return delta;
    };
    let Some(usage) = message.get("usage") else {
        return delta;
    };

    delta.turn_input_tokens = usage.get("input_tokens").and_then(|v| v.as_u64());
    delta.turn_output_tokens = usage.get("output_tokens").and_then(|v| v.as_u64());
    delta.context_window = event
        .raw
        .get("context_window")
        .and_then(|v| v.as_u64())
        .or_else(|| usage.get("context_window").and_then(|v| v.as_u64()));

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_assistant_events_carry_no_usage() {
        let event = ProviderEvent::new("", json!({"type": "user"}));
        assert_eq!(extract_usage_from_json(&event), UsageDelta::default());
    }

    #[test]
    fn assistant_usage_is_read_through_to_the_delta() {
        let event = ProviderEvent::new(
            "",
            json!({
                "type": "assistant",
                "message": {"usage": {"input_tokens": 120, "output_tokens": 40}},
            }),
        );
        let delta = extract_usage_from_json(&event);
        assert_eq!(delta.turn_input_tokens, Some(120));
        assert_eq!(delta.turn_output_tokens, Some(40));
        assert_eq!(delta.context_window, None);
    }

    #[test]
    fn a_reported_context_window_is_carried_through() {
        let event = ProviderEvent::new(
            "",
            json!({
                "type": "assistant",
                "context_window": 200_000,
                "message": {"usage": {"input_tokens": 1, "output_tokens": 1}},
            }),
        );
        assert_eq!(extract_usage_from_json(&event).context_window, Some(200_000));
    }
}
