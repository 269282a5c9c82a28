//! §6 Comms: send/check_inbox/purge_inbox/get_history/list_triggers/
//! clear_moon_crash.

use crate::context::Cx;
use crate::error::CliResult;
use clap::Subcommand;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum CommsCommand {
    Send {
        to: String,
        content: String,
    },
    CheckInbox {
        name: String,
    },
    PurgeInbox {
        name: String,
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
    GetHistory {
        name: String,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    ListTriggers,
    ClearMoonCrash,
}

pub fn handle(cx: &mut Cx, class: legion_core::AgentClass, command: CommsCommand) -> CliResult<Value> {
    match command {
        CommsCommand::Send { to, content } => {
            let ids = cx.store.send(&cx.caller, &to, &content, &cx.project)?;
            Ok(json!({"message_ids": ids}))
        }
        CommsCommand::CheckInbox { name } => Ok(json!(cx.store.check_inbox(&name)?)),
        CommsCommand::PurgeInbox { name, older_than_hours } => {
            let n = cx.store.purge_inbox(&name, older_than_hours)?;
            Ok(json!({"purged": n}))
        }
        CommsCommand::GetHistory { name, limit } => Ok(json!(cx.store.get_history(&name, limit)?)),
        CommsCommand::ListTriggers => Ok(json!(legion_storage::Store::list_triggers())),
        CommsCommand::ClearMoonCrash => {
            cx.store.clear_moon_crash(class)?;
            Ok(json!({"moon_crash_cleared": true}))
        }
    }
}
