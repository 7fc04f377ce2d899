// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Staged cloud deployments with per-stage locking and guided recovery")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Copy)]
pub struct OutputArgs {
    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,

    /// Print only the final result
    #[arg(short, long, conflicts_with = "json")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stagehand.yml configuration file
    Init {
        /// Project name (defaults to the directory name)
        #[arg(short, long)]
        project: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Deploy a stage
    Deploy {
        /// Stage to deploy (defined in config)
        stage: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Clear the file and remote locks left by a failed deployment
    Recover {
        /// Stage to recover
        stage: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show lock status for a stage
    Status {
        /// Stage to inspect
        stage: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Suggest remediation steps for a deployment error message
    Guidance {
        /// Stage the error happened on
        stage: String,

        /// Error message to classify
        message: String,

        #[command(flatten)]
        output: OutputArgs,
    },
}
