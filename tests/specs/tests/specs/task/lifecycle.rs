//! Task DAG: create -> assign -> pull -> complete_phase, plus blockers
//! and the pull race.

use crate::prelude::*;

fn with_plan(fleet: &Fleet) {
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "the plan"]).passes();
}

#[test]
fn create_task_requires_active_plan() {
    let fleet = Fleet::empty();
    fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "Ship it", "do the thing"])
        .fails_with(2);
}

#[test]
fn create_assign_pull_complete_phase_walks_base_flow() {
    let fleet = Fleet::empty();
    with_plan(&fleet);
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();

    let created = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "Ship it", "do the thing"])
        .passes()
        .json();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    fleet
        .legion("lead-1", "lead")
        .args(&["task", "assign", &task_id, "coder-1"])
        .passes();
    let got = fleet.legion("lead-1", "lead").args(&["task", "get", &task_id]).passes().json();
    assert_eq!(got["status"], "assigned");

    fleet
        .legion("coder-1", "coder")
        .args(&["task", "pull", &task_id])
        .passes();
    let got = fleet.legion("lead-1", "lead").args(&["task", "get", &task_id]).passes().json();
    assert_eq!(got["status"], "in_progress");

    // in_progress's workers include coder, so this advances to "fixed".
    let advanced = fleet
        .legion("coder-1", "coder")
        .args(&["task", "complete-phase", &task_id])
        .passes()
        .json();
    assert_eq!(advanced["new_status"], "fixed");

    // fixed's workers are oracle-only, and its `requires` demands a
    // submitted result first.
    fleet.legion("lead-1", "lead").args(&["agent", "register", "oracle-1"]).passes();
    fleet
        .legion("oracle-1", "oracle")
        .args(&["task", "complete-phase", &task_id])
        .fails_with(2);

    fleet
        .legion("coder-1", "coder")
        .args(&["task", "submit-result", &task_id, "all tests green"])
        .passes();

    let advanced = fleet
        .legion("oracle-1", "oracle")
        .args(&["task", "complete-phase", &task_id])
        .passes()
        .json();
    assert_eq!(advanced["new_status"], "verified");
}

#[test]
fn close_without_result_fails() {
    let fleet = Fleet::empty();
    with_plan(&fleet);
    let created = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "Ship it", "do the thing"])
        .passes()
        .json();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    fleet
        .legion("lead-1", "lead")
        .args(&["task", "close", &task_id])
        .fails_with(2);
}

#[test]
fn pull_task_blocked_by_open_blocker() {
    let fleet = Fleet::empty();
    with_plan(&fleet);
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();

    let blocker = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "Blocker", "must finish first"])
        .passes()
        .json();
    let blocker_id = blocker["task_id"].as_str().unwrap().to_string();

    let out = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "Blocked", "waits on the blocker"])
        .args(&["--blocked-by", &blocker_id])
        .passes()
        .json();
    let task_id = out["task_id"].as_str().unwrap().to_string();

    fleet
        .legion("coder-1", "coder")
        .args(&["task", "pull", &task_id])
        .fails_with(2);
}

#[test]
fn pull_race_exactly_one_winner() {
    let fleet = Fleet::empty();
    with_plan(&fleet);
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-2"]).passes();

    let created = fleet
        .legion("lead-1", "lead")
        .args(&["task", "create", "Race", "whoever gets there first"])
        .passes()
        .json();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let r1 = fleet.legion("coder-1", "coder").args(&["task", "pull", &task_id]).command().output().unwrap();
    let r2 = fleet.legion("coder-2", "coder").args(&["task", "pull", &task_id]).command().output().unwrap();

    let successes = [&r1, &r2].iter().filter(|o| o.status.success()).count();
    assert_eq!(successes, 1, "exactly one pull_task call should win the race");
}
