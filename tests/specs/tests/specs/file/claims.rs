//! File claim service: exclusive holders, FIFO waitlist, lead override.

use crate::prelude::*;

#[test]
fn claim_then_release_leaves_no_trace() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();

    let out = fleet
        .legion("coder-1", "coder")
        .args(&["file", "claim", "src/lib.rs"])
        .passes()
        .json();
    assert_eq!(out["granted"], true);

    fleet
        .legion("coder-1", "coder")
        .args(&["file", "release", "src/lib.rs"])
        .passes();

    let claims = fleet.legion("lead-1", "lead").args(&["file", "list-claims"]).passes().json();
    assert_eq!(claims.as_array().unwrap().len(), 0);
}

#[test]
fn second_claimant_waitlists_and_release_hands_off_in_order() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-2"]).passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-3"]).passes();

    fleet.legion("coder-1", "coder").args(&["file", "claim", "src/lib.rs"]).passes();

    let w2 = fleet
        .legion("coder-2", "coder")
        .args(&["file", "claim", "src/lib.rs"])
        .passes()
        .json();
    assert_eq!(w2["granted"], false);
    assert_eq!(w2["position"], 1);

    let w3 = fleet
        .legion("coder-3", "coder")
        .args(&["file", "claim", "src/lib.rs"])
        .passes()
        .json();
    assert_eq!(w3["granted"], false);
    assert_eq!(w3["position"], 2);

    fleet.legion("coder-1", "coder").args(&["file", "release", "src/lib.rs"]).passes();

    let claims = fleet.legion("lead-1", "lead").args(&["file", "list-claims"]).passes().json();
    let claim = &claims.as_array().unwrap()[0];
    assert_eq!(claim["holder"], "coder-2");
}

#[test]
fn non_holder_cannot_release_without_force() {
    let fleet = Fleet::empty();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-1"]).passes();
    fleet.legion("lead-1", "lead").args(&["agent", "register", "coder-2"]).passes();

    fleet.legion("coder-1", "coder").args(&["file", "claim", "src/lib.rs"]).passes();

    fleet
        .legion("coder-2", "coder")
        .args(&["file", "release", "src/lib.rs"])
        .fails_with(2);
}
