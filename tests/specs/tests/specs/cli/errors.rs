//! CLI-level behavior: unknown subcommands, missing datastore, and the
//! shape of error output.

use crate::prelude::*;

#[test]
fn unknown_agent_reports_not_found_and_exits_two() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["agent", "check-activity", "nobody"])
        .fails_with(2);
}

#[test]
fn error_output_is_json_with_an_error_field() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    let run = fleet
        .legion("lead-1", "lead")
        .args(&["agent", "check-activity", "nobody"])
        .fails_with(2);
    let value = run.json();
    assert!(value["error"].is_string());
}

#[test]
fn opening_a_fresh_datastore_creates_it_lazily() {
    let fleet = Fleet::empty();
    assert!(!fleet.db_path().exists());

    fleet.legion("lead-1", "lead").args(&["agent", "who"]).passes();
    assert!(fleet.db_path().exists());
}
