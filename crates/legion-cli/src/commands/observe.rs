//! §6 Observability: party_status/sitrep/poll/list_tools.

use crate::context::Cx;
use crate::error::CliResult;
use clap::Subcommand;
use legion_core::AgentClass;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum ObserveCommand {
    PartyStatus { zone: String },
    /// Project-wide situation report: plan, tasks, crew, flags.
    Sitrep,
    /// Non-consuming peek at pending work for one agent.
    Poll { name: String },
    ListTools,
}

pub fn handle(cx: &mut Cx, _class: AgentClass, command: ObserveCommand) -> CliResult<Value> {
    match command {
        ObserveCommand::PartyStatus { zone } => Ok(json!(cx.store.party_status(&zone)?)),
        ObserveCommand::Sitrep => {
            let plan = cx.store.get_plan(&cx.project)?;
            let tasks = cx.store.list_tasks(&cx.project, None)?;
            let crew = cx.store.who()?;
            let recent_log = cx.store.get_log(&cx.project, 10)?;
            let moon_crash = cx.store.is_flag_set("moon_crash")?;
            let stand_down = cx.store.is_flag_set("stand_down")?;
            Ok(json!({
                "project": cx.project,
                "plan": plan,
                "tasks": tasks,
                "crew": crew,
                "recent_log": recent_log,
                "moon_crash": moon_crash,
                "stand_down": stand_down,
            }))
        }
        ObserveCommand::Poll { name } => {
            let unread = cx.store.unread_count(&name)?;
            let fresh = cx.store.check_freshness(&name)?;
            let assigned: Vec<_> = cx
                .store
                .list_tasks(&cx.project, None)?
                .into_iter()
                .filter(|t| t.assigned_to.as_deref() == Some(name.as_str()))
                .collect();
            Ok(json!({"name": name, "unread": unread, "fresh": fresh, "assigned_tasks": assigned}))
        }
        ObserveCommand::ListTools => Ok(json!([
            "register", "deregister", "rename", "who", "set_context", "set_status", "cold_start",
            "fenix_down", "update_hp", "check_activity", "check_freshness",
            "send", "check_inbox", "purge_inbox", "get_history", "list_triggers", "clear_moon_crash",
            "create_task", "assign_task", "pull_task", "update_task", "submit_result", "complete_phase",
            "close_task", "reopen_task", "get_task", "list_tasks", "task_lineage",
            "list_flows", "show_flow", "next_status", "transition",
            "claim_file", "release_file", "list_claims",
            "set_plan", "get_plan", "update_plan_status", "log", "get_log",
            "spawn_party", "stand_down", "retire_agent", "recruit", "hand_off_zone", "interrupt", "resume", "list_crews",
            "party_status", "sitrep", "poll", "list_tools",
        ])),
    }
}
