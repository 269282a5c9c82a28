//! §6 Files: claim_file/release_file/list_claims.

use crate::context::Cx;
use crate::error::CliResult;
use clap::Subcommand;
use legion_core::AgentClass;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum FileCommand {
    Claim { path: String },
    Release {
        path: String,
        #[arg(long)]
        force: bool,
    },
    ListClaims,
}

pub fn handle(cx: &mut Cx, class: AgentClass, command: FileCommand) -> CliResult<Value> {
    match command {
        FileCommand::Claim { path } => Ok(json!(cx.store.claim_file(&cx.caller, &path)?)),
        FileCommand::Release { path, force } => {
            cx.store.release_file(class, &cx.caller, &path, force)?;
            Ok(json!({"released": path}))
        }
        FileCommand::ListClaims => Ok(json!(cx.store.list_claims()?)),
    }
}
