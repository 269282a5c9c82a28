//! sitrep / poll / list_tools: read-only composites over the store.

use crate::prelude::*;

#[test]
fn sitrep_reports_project_plan_tasks_and_crew() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "ship it"]).passes();

    let sitrep = fleet.legion("lead-1", "lead").args(&["observe", "sitrep"]).passes().json();
    assert_eq!(sitrep["project"], "demo");
    assert_eq!(sitrep["plan"]["status"], "active");
    assert_eq!(sitrep["moon_crash"], false);
}

#[test]
fn poll_reports_unread_count_and_freshness_without_consuming_inbox() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["war-room", "set-plan", "ship it"]).passes();
    fleet
        .legion("lead-1", "lead")
        .args(&["agent", "set-context", "lead-1", "kicking things off"])
        .passes();
    fleet.legion("lead-1", "lead").args(&["comms", "send", "coder-1", "hello"]).passes();

    let first = fleet.legion("coder-1", "coder").args(&["observe", "poll", "coder-1"]).passes().json();
    assert_eq!(first["unread"], 1);

    let second = fleet.legion("coder-1", "coder").args(&["observe", "poll", "coder-1"]).passes().json();
    assert_eq!(second["unread"], 1, "poll must never consume the inbox it peeks at");
}

#[test]
fn list_tools_includes_every_documented_operation() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    let tools = fleet.legion("lead-1", "lead").args(&["observe", "list-tools"]).passes().json();
    let names: Vec<&str> = tools.as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    for op in ["register", "send", "pull_task", "claim_file", "set_plan", "spawn_party", "transition"] {
        assert!(names.contains(&op), "list_tools missing {op}: {names:?}");
    }
}
