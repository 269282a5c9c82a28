//! Agent registry lifecycle: register, who, set_status, rename.

use crate::prelude::*;

#[test]
fn register_then_who_lists_agent() {
    let fleet = Fleet::empty();

    fleet
        .legion("lead-1", "lead")
        .args(&["agent", "register", "lead-1"])
        .passes();

    let who = fleet.legion("lead-1", "lead").args(&["agent", "who"]).passes().json();
    let names: Vec<&str> = who.as_array().unwrap().iter().map(|a| a["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"lead-1"), "who: {who}");
}

#[test]
fn register_is_idempotent() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    let who = fleet.legion("lead-1", "lead").args(&["agent", "who"]).passes().json();
    assert_eq!(who.as_array().unwrap().len(), 1);
}

#[test]
fn rename_changes_registry_entry() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();
    fleet
        .legion("lead-1", "lead")
        .args(&["agent", "rename", "coder-1", "coder-one"])
        .passes();

    let who = fleet.legion("lead-1", "lead").args(&["agent", "who"]).passes().json();
    let names: Vec<&str> = who.as_array().unwrap().iter().map(|a| a["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"coder-one"));
    assert!(!names.contains(&"coder-1"));
}

#[test]
fn check_freshness_is_stale_before_set_context() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    let out = fleet
        .legion("lead-1", "lead")
        .args(&["agent", "check-freshness", "lead-1"])
        .passes()
        .json();
    assert_eq!(out["fresh"], false);
}

#[test]
fn set_context_makes_agent_fresh() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet
        .legion("lead-1", "lead")
        .args(&["agent", "set-context", "lead-1", "working on the onboarding task"])
        .passes();

    let out = fleet
        .legion("lead-1", "lead")
        .args(&["agent", "check-freshness", "lead-1"])
        .passes()
        .json();
    assert_eq!(out["fresh"], true);
}
