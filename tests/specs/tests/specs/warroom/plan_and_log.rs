//! War-room: set_plan / get_plan / update_plan_status / log / get_log.

use crate::prelude::*;

#[test]
fn set_plan_then_get_plan_round_trips() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "ship onboarding"]).passes();

    let plan = fleet.legion("lead-1", "lead").args(&["war-room", "get-plan"]).passes().json();
    assert_eq!(plan["status"], "active");
}

#[test]
fn non_lead_cannot_update_plan_status() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "ship onboarding"]).passes();
    let plan = fleet.legion("lead-1", "lead").args(&["war-room", "get-plan"]).passes().json();
    let plan_id = plan["id"].as_str().unwrap().to_string();

    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();
    fleet
        .legion("coder-1", "coder")
        .args(&["war-room", "update-plan-status", &plan_id, "completed"])
        .fails_with(4);
}

#[test]
fn log_then_get_log_returns_entries_newest_first_or_oldest_first_consistently() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["war-room", "log", "kickoff"]).passes();
    fleet.legion("lead-1", "lead").args(&["war-room", "log", "first milestone"]).passes();

    let log = fleet.legion("lead-1", "lead").args(&["war-room", "get-log"]).passes().json();
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), 2);
}
