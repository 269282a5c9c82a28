//! §6 Flows: list_flows/show_flow/next_status/transition (manual).

use crate::context::Cx;
use crate::error::{CliError, CliResult};
use clap::Subcommand;
use legion_core::AgentClass;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum FlowCommand {
    List,
    Show { name: String },
    NextStatus { task_id: String },
    Transition { task_id: String, to_status: String },
}

pub fn handle(cx: &mut Cx, class: AgentClass, command: FlowCommand) -> CliResult<Value> {
    match command {
        FlowCommand::List => Ok(json!(cx.store.flows().names())),
        FlowCommand::Show { name } => {
            let flow = cx
                .store
                .flows()
                .resolve(&name)
                .map_err(CliError::from)?;
            Ok(json!(flow))
        }
        FlowCommand::NextStatus { task_id } => Ok(json!(cx.store.next_status(&task_id)?)),
        FlowCommand::Transition { task_id, to_status } => {
            cx.store.transition(class, &cx.caller, &task_id, &to_status)?;
            Ok(json!({"transitioned": task_id, "to": to_status}))
        }
    }
}
