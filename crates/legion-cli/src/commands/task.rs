//! §6 Tasks: create_task/assign_task/pull_task/update_task/submit_result/
//! complete_phase/close_task/reopen_task/get_task/list_tasks/task_lineage.

use crate::context::Cx;
use crate::error::{CliError, CliResult};
use clap::{Args, Subcommand};
use legion_core::AgentClass;
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    Create(CreateArgs),
    Assign { task_id: String, agent: String },
    Pull { task_id: String },
    Update(UpdateArgs),
    SubmitResult { task_id: String, result_text: String },
    CompletePhase {
        task_id: String,
        #[arg(long)]
        failed: bool,
    },
    Close { task_id: String },
    Reopen { task_id: String, target_stage: String },
    Get { task_id: String },
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Lineage { task_id: String },
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    pub title: String,
    pub text: String,
    #[arg(long, default_value = "_base")]
    pub task_type: String,
    #[arg(long)]
    pub zone: Option<String>,
    #[arg(long)]
    pub class_required: Option<String>,
    #[arg(long = "blocked-by")]
    pub blocked_by: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub task_id: String,
    #[arg(long)]
    pub progress: Option<String>,
    #[arg(long = "file")]
    pub files: Vec<String>,
    #[arg(long)]
    pub status: Option<String>,
}

pub fn handle(cx: &mut Cx, class: AgentClass, command: TaskCommand) -> CliResult<Value> {
    match command {
        TaskCommand::Create(args) => {
            let class_required = args
                .class_required
                .as_deref()
                .map(crate::context::parse_class)
                .transpose()?;
            let id = cx.store.create_task(
                class,
                &cx.caller,
                &cx.project,
                &args.title,
                &args.text,
                &args.task_type,
                args.zone.as_deref(),
                class_required,
                &args.blocked_by,
            )?;
            Ok(json!({"task_id": id.as_str()}))
        }
        TaskCommand::Assign { task_id, agent } => {
            let warning = cx.store.assign_task(class, &task_id, &agent)?;
            Ok(json!({"assigned": agent, "warning": warning}))
        }
        TaskCommand::Pull { task_id } => {
            cx.store.pull_task(class, &cx.caller, &task_id)?;
            Ok(json!({"pulled": task_id}))
        }
        TaskCommand::Update(args) => {
            let files = (!args.files.is_empty()).then_some(args.files.as_slice());
            cx.store
                .update_task(&args.task_id, args.progress.as_deref(), files, args.status.as_deref())?;
            Ok(json!({"updated": args.task_id}))
        }
        TaskCommand::SubmitResult { task_id, result_text } => {
            cx.store.submit_result(&task_id, &result_text)?;
            Ok(json!({"result_submitted": task_id}))
        }
        TaskCommand::CompletePhase { task_id, failed } => {
            let (new_status, warning) = cx.store.complete_phase(class, &cx.caller, &task_id, failed)?;
            Ok(json!({"new_status": new_status, "warning": warning}))
        }
        TaskCommand::Close { task_id } => {
            cx.store.close_task(class, &cx.caller, &task_id)?;
            Ok(json!({"closed": task_id}))
        }
        TaskCommand::Reopen { task_id, target_stage } => {
            cx.store
                .reopen_task(class, &cx.caller, &task_id, &target_stage)?;
            Ok(json!({"reopened": task_id, "stage": target_stage}))
        }
        TaskCommand::Get { task_id } => {
            let task = cx
                .store
                .get_task(&task_id)?
                .ok_or_else(|| CliError::Usage(format!("no such task: {task_id}")))?;
            Ok(json!(task))
        }
        TaskCommand::List { status } => Ok(json!(cx.store.list_tasks(&cx.project, status.as_deref())?)),
        TaskCommand::Lineage { task_id } => {
            let (history, flow) = cx.store.task_lineage(&task_id)?;
            Ok(json!({"history": history, "flow": flow}))
        }
    }
}
