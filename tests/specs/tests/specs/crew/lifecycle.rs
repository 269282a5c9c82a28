//! Crew lifecycle: spawn_party / recruit / hand_off_zone / list_crews /
//! party_status.

use crate::prelude::*;

#[test]
fn spawn_party_registers_every_member_in_the_zone() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["crew", "spawn-party", "alpha", "--member", "coder-1:coder", "--member", "coder-2:coder"])
        .passes();

    let status = fleet
        .legion("lead-1", "lead")
        .args(&["observe", "party-status", "alpha"])
        .passes()
        .json();
    assert_eq!(status.as_array().unwrap().len(), 2);
}

#[test]
fn recruit_adds_one_agent_to_an_existing_zone() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet
        .legion("lead-1", "lead")
        .args(&["crew", "spawn-party", "alpha", "--member", "coder-1:coder"])
        .passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["crew", "recruit", "coder-2", "coder", "--zone", "alpha"])
        .passes();

    let status = fleet
        .legion("lead-1", "lead")
        .args(&["observe", "party-status", "alpha"])
        .passes()
        .json();
    assert_eq!(status.as_array().unwrap().len(), 2);
}

#[test]
fn hand_off_zone_transfers_one_agents_zone_and_role_to_another() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();
    fleet
        .legion("lead-1", "lead")
        .args(&["crew", "spawn-party", "alpha", "--member", "coder-1:coder"])
        .passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-2"]).passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["crew", "hand-off-zone", "coder-1", "coder-2"])
        .passes();

    let alpha = fleet
        .legion("lead-1", "lead")
        .args(&["observe", "party-status", "alpha"])
        .passes()
        .json();
    let holders: Vec<&str> = alpha.as_array().unwrap().iter().map(|a| a["name"].as_str().unwrap()).collect();
    assert_eq!(holders, vec!["coder-2"]);
}

#[test]
fn non_lead_cannot_spawn_a_party() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();

    fleet
        .legion("coder-1", "coder")
        .args(&["crew", "spawn-party", "alpha", "--member", "coder-2:coder"])
        .fails_with(4);
}

#[test]
fn stand_down_reports_a_fixed_shape() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "lead-1"]).passes();

    fleet
        .legion("lead-1", "lead")
        .args(&["crew", "stand-down"])
        .passes()
        .json_is(serde_json::json!({"stand_down": true}));
}
