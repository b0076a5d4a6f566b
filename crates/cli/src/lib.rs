pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "fernwood",
    about = "Fernwood operator CLI",
    long_about = "Operate the Fernwood storefront: migrations, catalog seeding, and config inspection.",
    after_help = "Examples:\n  fernwood migrate\n  fernwood seed\n  fernwood config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the showroom catalog fixtures and verify they landed")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
