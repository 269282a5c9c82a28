//! `legion`: the operator-facing CLI over the coordination kernel's
//! datastore. Every invocation is a fresh process — it opens the
//! datastore, runs one command, prints one structured result, and exits
//! with the §6 exit code for whatever happened.

mod commands;
mod context;
mod error;
mod output;

use clap::{Parser, Subcommand};
use commands::{agent, comms, crew, file, flow, observe, task, warroom};
use context::{default_work_dir, env_or, parse_class, Cx};
use output::{emit, OutputFormat};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "legion", version, about = "Coordination kernel for a fleet of agent processes")]
struct Cli {
    /// Path to the datastore file. Defaults to $DB_PATH or ./minion.db.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Project name scoping plans/tasks/logs. Defaults to $PROJECT.
    #[arg(long, global = true)]
    project: Option<String>,
    /// Identity this invocation acts as. Defaults to $CALLER_NAME.
    #[arg(long, global = true)]
    r#as: Option<String>,
    /// Authorization class of the caller. Defaults to $CALLER_CLASS.
    #[arg(long, global = true)]
    class: Option<String>,
    #[arg(short = 'o', long, value_enum, default_value_t, global = true)]
    output: OutputFormat,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand)]
    Agent(agent::AgentCommand),
    #[command(subcommand)]
    Comms(comms::CommsCommand),
    #[command(subcommand)]
    Task(task::TaskCommand),
    #[command(subcommand)]
    Flow(flow::FlowCommand),
    #[command(subcommand)]
    File(file::FileCommand),
    #[command(subcommand, name = "war-room")]
    WarRoom(warroom::WarRoomCommand),
    #[command(subcommand)]
    Crew(crew::CrewCommand),
    #[command(subcommand)]
    Observe(observe::ObserveCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let db_path = cli.db.unwrap_or_else(|| PathBuf::from(env_or("DB_PATH", "minion.db")));
    let work_dir = default_work_dir(&db_path);
    let docs_dir = PathBuf::from(env_or("DOCS_DIR", "docs"));
    let project = cli.project.unwrap_or_else(|| env_or("PROJECT", "default"));
    let caller = cli.r#as.unwrap_or_else(|| env_or("CALLER_NAME", "operator"));
    let class_str = cli.class.unwrap_or_else(|| env_or("CALLER_CLASS", "lead"));

    let class = match parse_class(&class_str) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    let mut cx = match Cx::open(&db_path, &work_dir, &docs_dir, project, caller, class) {
        Ok(cx) => cx,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let result = match cli.command {
        Commands::Agent(c) => agent::handle(&mut cx, class, c),
        Commands::Comms(c) => comms::handle(&mut cx, class, c),
        Commands::Task(c) => task::handle(&mut cx, class, c),
        Commands::Flow(c) => flow::handle(&mut cx, class, c),
        Commands::File(c) => file::handle(&mut cx, class, c),
        Commands::WarRoom(c) => warroom::handle(&mut cx, class, c),
        Commands::Crew(c) => crew::handle(&mut cx, class, c),
        Commands::Observe(c) => observe::handle(&mut cx, class, c),
    };

    match result {
        Ok(value) => {
            emit(cli.output, &value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            emit(cli.output, &serde_json::json!({"error": e.to_string()}));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
