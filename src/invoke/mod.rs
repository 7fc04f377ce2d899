// ABOUTME: Pluggable build, deploy, cache-invalidation and backup collaborators.
// ABOUTME: Traits for the orchestrator plus command-backed implementations.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::types::Stage;

/// Inputs shared by every invocation for one stage.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub stage: Stage,
    pub profile: Option<String>,
    pub project_root: PathBuf,
    /// Extra environment for the stage (resolved from config).
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(stage: Stage, project_root: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            profile: None,
            project_root: project_root.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Attach stage context, profile and working directory to a command.
    pub fn prepare(&self, command: CommandSpec) -> CommandSpec {
        command
            .envs(self.env.clone())
            .env("STAGEHAND_STAGE", self.stage.as_str())
            .profile(self.profile.as_deref())
            .current_dir(&self.project_root)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("`{command}` failed ({status}): {message}")]
    Failed {
        command: String,
        status: String,
        message: String,
    },
}

impl InvokeError {
    fn from_output(command: &CommandSpec, output: &CommandOutput) -> Self {
        InvokeError::Failed {
            command: command.to_string(),
            status: match output.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "killed by signal".to_string(),
            },
            message: output.failure_summary(),
        }
    }
}

async fn run_checked(
    runner: &dyn CommandRunner,
    command: &CommandSpec,
) -> Result<CommandOutput, InvokeError> {
    let output = runner.run(command).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(InvokeError::from_output(command, &output))
    }
}

/// Whether the build step actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    /// The deploy tool builds as part of deploying.
    Skipped,
}

#[async_trait]
pub trait BuildInvoker: Send + Sync {
    async fn build(&self, invocation: &Invocation) -> Result<BuildOutcome, InvokeError>;
}

#[async_trait]
pub trait DeployInvoker: Send + Sync {
    async fn deploy(&self, invocation: &Invocation) -> Result<(), InvokeError>;
}

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, invocation: &Invocation) -> Result<(), InvokeError>;
}

#[async_trait]
pub trait BackupInvoker: Send + Sync {
    /// Take a backup and return where it was written.
    async fn backup(&self, invocation: &Invocation) -> Result<PathBuf, InvokeError>;
}

/// Build through an explicit command, or skip for self-building deploy tools.
pub struct CommandBuild {
    runner: Arc<dyn CommandRunner>,
    command: Option<CommandSpec>,
}

impl CommandBuild {
    pub fn new(runner: Arc<dyn CommandRunner>, command: Option<CommandSpec>) -> Self {
        Self { runner, command }
    }
}

#[async_trait]
impl BuildInvoker for CommandBuild {
    async fn build(&self, invocation: &Invocation) -> Result<BuildOutcome, InvokeError> {
        let Some(ref command) = self.command else {
            return Ok(BuildOutcome::Skipped);
        };
        let command = invocation.prepare(command.clone());
        tracing::info!("Building: {}", command);
        run_checked(self.runner.as_ref(), &command).await?;
        Ok(BuildOutcome::Built)
    }
}

/// Deploy via a custom script, or the infra tool's `deploy --stage` action.
pub struct CommandDeploy {
    runner: Arc<dyn CommandRunner>,
    command: DeployCommand,
}

/// How the deploy action is invoked.
#[derive(Debug, Clone)]
pub enum DeployCommand {
    /// A project script, run with the stage as its only argument.
    Script(PathBuf),
    /// The infra tool prefix, e.g. `npx sst`.
    Tool(CommandSpec),
}

impl CommandDeploy {
    pub fn new(runner: Arc<dyn CommandRunner>, command: DeployCommand) -> Self {
        Self { runner, command }
    }

    pub(crate) fn command_for(&self, invocation: &Invocation) -> CommandSpec {
        let base = match &self.command {
            DeployCommand::Script(path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    invocation.project_root.join(path)
                };
                CommandSpec::new(path.to_string_lossy()).arg(invocation.stage.as_str())
            }
            DeployCommand::Tool(tool) => tool
                .clone()
                .arg("deploy")
                .arg("--stage")
                .arg(invocation.stage.as_str()),
        };
        invocation.prepare(base)
    }
}

#[async_trait]
impl DeployInvoker for CommandDeploy {
    async fn deploy(&self, invocation: &Invocation) -> Result<(), InvokeError> {
        let command = self.command_for(invocation);
        tracing::info!("Deploying {}: {}", invocation.stage, command);
        run_checked(self.runner.as_ref(), &command).await?;
        Ok(())
    }
}

/// Invalidates a CloudFront distribution.
pub struct CloudFrontInvalidator {
    runner: Arc<dyn CommandRunner>,
    distribution_id: String,
    paths: Vec<String>,
}

impl CloudFrontInvalidator {
    pub fn new(runner: Arc<dyn CommandRunner>, distribution_id: impl Into<String>) -> Self {
        Self {
            runner,
            distribution_id: distribution_id.into(),
            paths: vec!["/*".to_string()],
        }
    }

    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        if !paths.is_empty() {
            self.paths = paths;
        }
        self
    }
}

#[async_trait]
impl CacheInvalidator for CloudFrontInvalidator {
    async fn invalidate(&self, invocation: &Invocation) -> Result<(), InvokeError> {
        let command = CommandSpec::new("aws")
            .args([
                "cloudfront",
                "create-invalidation",
                "--distribution-id",
                self.distribution_id.as_str(),
                "--paths",
            ])
            .args(self.paths.iter().cloned());
        let command = invocation.prepare(command);
        tracing::info!("Invalidating cache for {}", self.distribution_id);
        run_checked(self.runner.as_ref(), &command).await?;
        Ok(())
    }
}

/// Runs a backup command; its last non-empty stdout line is the backup path.
pub struct CommandBackup {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
}

impl CommandBackup {
    pub fn new(runner: Arc<dyn CommandRunner>, command: CommandSpec) -> Self {
        Self { runner, command }
    }
}

#[async_trait]
impl BackupInvoker for CommandBackup {
    async fn backup(&self, invocation: &Invocation) -> Result<PathBuf, InvokeError> {
        let command = invocation.prepare(self.command.clone());
        let output = run_checked(self.runner.as_ref(), &command).await?;
        output
            .stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| InvokeError::Failed {
                command: command.to_string(),
                status: "exit code 0".to_string(),
                message: "backup command did not print a backup path".to_string(),
            })
    }
}
