//! §6 War-room: set_plan/get_plan/update_plan_status/log/get_log.

use crate::context::Cx;
use crate::error::CliResult;
use clap::Subcommand;
use legion_core::AgentClass;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum WarRoomCommand {
    SetPlan { text: String },
    GetPlan,
    UpdatePlanStatus { plan_id: String, status: String },
    Log {
        text: String,
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    GetLog {
        #[arg(long, default_value_t = 20)]
        count: u32,
    },
}

pub fn handle(cx: &mut Cx, class: AgentClass, command: WarRoomCommand) -> CliResult<Value> {
    match command {
        WarRoomCommand::SetPlan { text } => {
            let id = cx.store.set_plan(&cx.caller, &cx.project, &text)?;
            Ok(json!({"plan_id": id.as_str()}))
        }
        WarRoomCommand::GetPlan => Ok(json!(cx.store.get_plan(&cx.project)?)),
        WarRoomCommand::UpdatePlanStatus { plan_id, status } => {
            cx.store.update_plan_status(class, &plan_id, &status)?;
            Ok(json!({"plan_id": plan_id, "status": status}))
        }
        WarRoomCommand::Log { text, priority } => {
            let id = cx.store.log(&cx.caller, &cx.project, &text, &priority)?;
            Ok(json!({"log_id": id.as_str()}))
        }
        WarRoomCommand::GetLog { count } => Ok(json!(cx.store.get_log(&cx.project, count)?)),
    }
}
