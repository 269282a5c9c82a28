//! Send / check_inbox / purge_inbox / broadcast semantics.

use crate::prelude::*;

fn prep_plan(fleet: &Fleet) {
    fleet
        .legion("lead-1", "lead")
        .args(&["war-room", "set-plan", "ship the onboarding flow"])
        .passes();
}

fn ready(fleet: &Fleet, name: &str) {
    fleet.legion("lead-1", "lead").args(&["agent", "register", name]).passes();
    fleet
        .legion(name, "lead")
        .args(&["agent", "set-context", name, "ready for work"])
        .passes();
}

#[test]
fn send_then_check_inbox_sees_message_in_order() {
    let fleet = Fleet::empty();
    prep_plan(&fleet);
    ready(&fleet, "lead-1");
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["comms", "send", "coder-1", "first message"])
        .passes();
    fleet
        .legion("lead-1", "lead")
        .args(&["comms", "send", "coder-1", "second message"])
        .passes();

    let inbox = fleet
        .legion("coder-1", "coder")
        .args(&["comms", "check-inbox", "coder-1"])
        .passes()
        .json();
    let msgs = inbox.as_array().unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0]["content"], "first message");
    assert_eq!(msgs[1]["content"], "second message");
}

#[test]
fn broadcast_to_empty_class_produces_zero_rows_and_succeeds() {
    // The sender is named literally "lead" so the auto-CC-to-lead rule
    // doesn't add a row of its own, isolating the empty-class behavior.
    let fleet = Fleet::empty();
    prep_plan(&fleet);
    ready(&fleet, "lead");

    let out = fleet
        .legion("lead", "lead")
        .args(&["comms", "send", "oracle", "anyone there?"])
        .passes()
        .json();
    assert_eq!(out["message_ids"].as_array().unwrap().len(), 0);
}

#[test]
fn send_blocked_when_caller_context_is_stale() {
    let fleet = Fleet::empty();
    prep_plan(&fleet);
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["comms", "send", "coder-1", "hello"])
        .fails_with(2);
}

#[test]
fn send_blocked_without_active_plan() {
    let fleet = Fleet::empty();
    ready(&fleet, "lead-1");
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["comms", "send", "coder-1", "hello"])
        .fails_with(2);
}
