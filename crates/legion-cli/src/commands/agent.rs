//! §6 Agents: register/deregister/rename/who/set_context/set_status/
//! cold_start/fenix_down/update_hp/check_activity/check_freshness.

use crate::context::Cx;
use crate::error::CliResult;
use clap::{Args, Subcommand};
use legion_core::Transport;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum AgentCommand {
    /// Register (or re-register) this caller in the agent registry.
    Register(RegisterArgs),
    Deregister { name: String },
    Rename { old_name: String, new_name: String },
    /// List every registered agent.
    Who,
    SetContext(SetContextArgs),
    SetStatus { name: String, status: String },
    ColdStart { name: String },
    FenixDown(FenixDownArgs),
    UpdateHp(UpdateHpArgs),
    CheckActivity { name: String },
    CheckFreshness { name: String },
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    pub name: String,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long, default_value = "daemon")]
    pub transport: String,
}

#[derive(Debug, Args)]
pub struct SetContextArgs {
    pub name: String,
    pub context: String,
    #[arg(long)]
    pub tokens_limit: Option<i64>,
    #[arg(long)]
    pub self_reported_hp_pct: Option<u32>,
}

#[derive(Debug, Args)]
pub struct FenixDownArgs {
    pub name: String,
    pub manifest: String,
    #[arg(long = "file")]
    pub files: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateHpArgs {
    pub name: String,
    pub turn_input_tokens: i64,
    pub turn_output_tokens: i64,
    #[arg(long)]
    pub context_window: Option<i64>,
}

pub fn handle(cx: &mut Cx, class: legion_core::AgentClass, command: AgentCommand) -> CliResult<Value> {
    match command {
        AgentCommand::Register(args) => {
            let transport = if args.transport == "terminal" {
                Transport::Terminal
            } else {
                Transport::Daemon
            };
            cx.store.register(&args.name, class, args.model.as_deref(), transport)?;
            Ok(json!({"registered": args.name}))
        }
        AgentCommand::Deregister { name } => {
            cx.store.deregister(&name)?;
            Ok(json!({"deregistered": name}))
        }
        AgentCommand::Rename { old_name, new_name } => {
            cx.store.rename(&old_name, &new_name)?;
            Ok(json!({"renamed": new_name}))
        }
        AgentCommand::Who => Ok(json!(cx.store.who()?)),
        AgentCommand::SetContext(args) => {
            cx.store.set_context(
                &args.name,
                &args.context,
                args.tokens_limit,
                args.self_reported_hp_pct,
            )?;
            Ok(json!({"context_set": args.name}))
        }
        AgentCommand::SetStatus { name, status } => {
            cx.store.set_status(&name, &status)?;
            Ok(json!({"status_set": name}))
        }
        AgentCommand::ColdStart { name } => {
            let briefing = cx.store.cold_start(&name, &cx.project)?;
            Ok(json!(briefing))
        }
        AgentCommand::FenixDown(args) => {
            let id = cx.store.fenix_down(&args.name, &args.files, &args.manifest)?;
            Ok(json!({"fenix_id": id.as_str()}))
        }
        AgentCommand::UpdateHp(args) => {
            let (pct, newly_fired) = cx.store.update_hp(
                &args.name,
                args.turn_input_tokens,
                args.turn_output_tokens,
                args.context_window,
            )?;
            Ok(json!({"hp_pct": pct, "newly_fired_alerts": newly_fired}))
        }
        AgentCommand::CheckActivity { name } => {
            let agent = cx
                .store
                .get_agent(&name)?
                .ok_or_else(|| legion_core::KernelError::NotFound(name.clone()))?;
            let liveness = agent.liveness(cx.store.now_ms());
            Ok(json!({"name": name, "liveness": liveness, "last_seen_ms": agent.last_seen_ms}))
        }
        AgentCommand::CheckFreshness { name } => {
            let fresh = cx.store.check_freshness(&name)?;
            Ok(json!({"name": name, "fresh": fresh}))
        }
    }
}
