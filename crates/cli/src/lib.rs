pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "agendum",
    about = "Agendum operator CLI",
    long_about = "Inspect configuration, run readiness checks, and verify Google Calendar and Gmail access.",
    after_help = "Examples:\n  agendum doctor --json\n  agendum config\n  agendum check-calendar"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, timezone, and credential presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Read the configured calendar's summary and timezone")]
    CheckCalendar,
    #[command(about = "Send a test message from the configured sender to itself")]
    CheckGmail,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::CheckCalendar => commands::check_calendar::run(),
        Command::CheckGmail => commands::check_gmail::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
