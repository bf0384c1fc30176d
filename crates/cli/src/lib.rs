pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "fixquote",
    about = "Fixquote operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and reconcile quote call status.",
    after_help = "Examples:\n  fixquote doctor --json\n  fixquote config\n  fixquote refresh 5f0c...\n  fixquote watch 5f0c... --interval-secs 10"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, voice and model readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Poll the voice provider once for every open call on a request")]
    Refresh {
        #[arg(help = "Service request id")]
        request_id: String,
    },
    #[command(about = "Refresh a request repeatedly until every call is terminal")]
    Watch {
        #[arg(help = "Service request id")]
        request_id: String,
        #[arg(long, default_value_t = 5, help = "Seconds between refresh rounds")]
        interval_secs: u64,
        #[arg(long, help = "Stop after this many rounds even if calls are still open")]
        max_rounds: Option<u32>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Refresh { request_id } => commands::refresh::run(&request_id),
        Command::Watch { request_id, interval_secs, max_rounds } => {
            commands::watch::run(&request_id, interval_secs, max_rounds)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
