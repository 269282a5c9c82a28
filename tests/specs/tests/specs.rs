//! Behavioral specifications for the `legion` CLI.
//!
//! These tests are black-box: they invoke the CLI binary and verify
//! stdout and exit codes. Each module under `specs/` spawns its own
//! isolated datastore via `Fleet`, so specs never share state.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/agent/registry.rs"]
mod agent_registry;

#[path = "specs/comms/messaging.rs"]
mod comms_messaging;

#[path = "specs/task/lifecycle.rs"]
mod task_lifecycle;

#[path = "specs/flow/transitions.rs"]
mod flow_transitions;

#[path = "specs/file/claims.rs"]
mod file_claims;

#[path = "specs/warroom/plan_and_log.rs"]
mod warroom_plan_and_log;

#[path = "specs/crew/lifecycle.rs"]
mod crew_lifecycle;

#[path = "specs/observe/reporting.rs"]
mod observe_reporting;

#[path = "specs/cli/errors.rs"]
mod cli_errors;
