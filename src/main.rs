// ABOUTME: Entry point for the stagehand CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use stagehand::config;
use stagehand::error::Result;
use stagehand::output::{Output, OutputMode};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { project, force } => {
            config::init_config(&cwd, project.as_deref(), force)?;
            println!("Created {}", config::CONFIG_FILENAME);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Deploy { stage, output } => {
            let output = Output::new(OutputMode::from_flags(output.json, output.quiet));
            commands::deploy(&cwd, &stage, output).await
        }
        Commands::Recover { stage, output } => {
            let output = Output::new(OutputMode::from_flags(output.json, output.quiet));
            commands::recover(&cwd, &stage, output).await
        }
        Commands::Status { stage, output } => {
            let output = Output::new(OutputMode::from_flags(output.json, output.quiet));
            commands::status(&cwd, &stage, output).await
        }
        Commands::Guidance {
            stage,
            message,
            output,
        } => {
            let output = Output::new(OutputMode::from_flags(output.json, output.quiet));
            commands::guidance(&stage, &message, output)
        }
    }
}
