//! Flow introspection and manual transition override.

use crate::prelude::*;

#[test]
fn list_flows_includes_base() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    let flows = fleet.legion("lead-1", "lead").args(&["flow", "list"]).passes().json();
    let names: Vec<&str> = flows.as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert!(names.contains(&"_base"));
}

#[test]
fn next_status_reports_both_success_and_failure_edges() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "plan"]).passes();
    let created = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "T", "body"])
        .passes()
        .json();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let next = fleet.legion("lead-1", "lead").args(&["flow", "next-status", &task_id]).passes().json();
    assert_eq!(next["next"], "assigned");
    assert!(next["fail"].is_null());
}

#[test]
fn transition_rejects_edges_outside_the_flow() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "plan"]).passes();
    let created = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "T", "body"])
        .passes()
        .json();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    fleet
        .legion("lead-1", "lead")
        .args(&["flow", "transition", &task_id, "closed"])
        .fails_with(2);
}

#[test]
fn transition_bypasses_worker_and_requires_gates_for_valid_edges() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "plan"]).passes();
    let created = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "T", "body"])
        .passes()
        .json();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    // "open -> assigned" is a valid edge even though a lead manually
    // forcing it skips the normal complete_phase worker-class check.
    fleet
        .legion("lead-1", "lead")
        .args(&["flow", "transition", &task_id, "assigned"])
        .passes();

    let got = fleet.legion("lead-1", "lead").args(&["task", "get", &task_id]).passes().json();
    assert_eq!(got["status"], "assigned");
}
