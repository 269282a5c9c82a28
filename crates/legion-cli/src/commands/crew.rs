//! §6 Crew lifecycle: spawn_party/stand_down/retire_agent/recruit/
//! hand_off_zone/interrupt/resume/list_crews.

use crate::context::{parse_class, Cx};
use crate::error::CliResult;
use clap::{Args, Subcommand};
use legion_core::AgentClass;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum CrewCommand {
    SpawnParty(SpawnPartyArgs),
    StandDown,
    RetireAgent { name: String },
    Recruit(RecruitArgs),
    HandOffZone { from: String, to: String },
    Interrupt {
        name: String,
        #[arg(long)]
        payload: Option<String>,
    },
    Resume {
        name: String,
        #[arg(long)]
        payload: Option<String>,
    },
    ListCrews,
}

#[derive(Debug, Args)]
pub struct SpawnPartyArgs {
    pub zone: String,
    /// `name:class` pairs, e.g. `coder-1:coder coder-2:coder`.
    #[arg(long = "member", required = true)]
    pub members: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RecruitArgs {
    pub name: String,
    pub class: String,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub zone: Option<String>,
    #[arg(long)]
    pub role: Option<String>,
}

fn parse_member(spec: &str) -> CliResult<(String, AgentClass, Option<String>, Option<String>)> {
    let (name, class_str) = spec
        .split_once(':')
        .ok_or_else(|| crate::error::CliError::Usage(format!("expected name:class, got {spec}")))?;
    Ok((name.to_string(), parse_class(class_str)?, None, None))
}

pub fn handle(cx: &mut Cx, class: AgentClass, command: CrewCommand) -> CliResult<Value> {
    match command {
        CrewCommand::SpawnParty(args) => {
            let members = args
                .members
                .iter()
                .map(|m| parse_member(m))
                .collect::<CliResult<Vec<_>>>()?;
            let crew = cx.store.spawn_party(class, &args.zone, &members)?;
            Ok(json!(crew))
        }
        CrewCommand::StandDown => {
            cx.store.set_stand_down(class, &cx.caller)?;
            Ok(json!({"stand_down": true}))
        }
        CrewCommand::RetireAgent { name } => {
            cx.store.retire_agent(class, &name)?;
            Ok(json!({"retired": name}))
        }
        CrewCommand::Recruit(args) => {
            let recruit_class = parse_class(&args.class)?;
            let agent = cx.store.recruit(
                class,
                &args.name,
                recruit_class,
                args.model.as_deref(),
                args.zone.as_deref(),
                args.role.as_deref(),
            )?;
            Ok(json!(agent))
        }
        CrewCommand::HandOffZone { from, to } => {
            cx.store.hand_off_zone(class, &from, &to)?;
            Ok(json!({"from": from, "to": to}))
        }
        CrewCommand::Interrupt { name, payload } => {
            let id = cx.store.interrupt(&name, payload.as_deref())?;
            Ok(json!({"signal_id": id.as_str()}))
        }
        CrewCommand::Resume { name, payload } => {
            let id = cx.store.resume(&name, payload.as_deref())?;
            Ok(json!({"signal_id": id.as_str()}))
        }
        CrewCommand::ListCrews => Ok(json!(cx.store.list_crews()?)),
    }
}
