// ABOUTME: Hooks system for deployment lifecycle events.
// ABOUTME: Discovers and executes project scripts at pre-deploy, post-deploy, and on-error points.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checks::{Check, CheckContext, CheckOutcome};
use crate::process::{CommandRunner, CommandSpec};
use crate::types::Stage;

/// Hook execution points in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before deployment starts. Failure aborts deployment.
    PreDeploy,
    /// After successful deployment. Failure logs warning.
    PostDeploy,
    /// On deployment failure. Failure logs warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort deployment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub stage: Stage,
    pub project: String,
    pub profile: Option<String>,
    pub domain: Option<String>,
    pub error: Option<String>,
}

impl HookContext {
    pub fn new(stage: Stage, project: impl Into<String>) -> Self {
        Self {
            stage,
            project: project.into(),
            profile: None,
            domain: None,
            error: None,
        }
    }

    /// Convert context to environment variables.
    pub fn to_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("STAGEHAND_STAGE".to_string(), self.stage.to_string());
        env.insert("STAGEHAND_PROJECT".to_string(), self.project.clone());
        if let Some(ref profile) = self.profile {
            env.insert("STAGEHAND_PROFILE".to_string(), profile.clone());
        }
        if let Some(ref domain) = self.domain {
            env.insert("STAGEHAND_DOMAIN".to_string(), domain.clone());
        }
        if let Some(ref error) = self.error {
            env.insert("STAGEHAND_ERROR".to_string(), error.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    project_dir: PathBuf,
    hooks_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl HookRunner {
    /// Create a new hook runner looking for hooks in the given project directory.
    pub fn new(project_dir: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            hooks_dir: project_dir.join(".stagehand").join("hooks"),
            runner,
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let command = CommandSpec::new(hook_path.to_string_lossy())
            .envs(context.to_env())
            .current_dir(&self.project_dir);

        match self.runner.run(&command).await {
            Ok(output) => {
                let result = HookResult {
                    success: output.success(),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}

/// The pre-deploy hook as a preflight check.
pub struct PreDeployHookCheck {
    hooks: Arc<HookRunner>,
    project: String,
}

impl PreDeployHookCheck {
    pub fn new(hooks: Arc<HookRunner>, project: impl Into<String>) -> Self {
        Self {
            hooks,
            project: project.into(),
        }
    }
}

#[async_trait]
impl Check for PreDeployHookCheck {
    fn name(&self) -> &str {
        "pre-deploy-hook"
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome {
        let mut context = HookContext::new(ctx.stage.clone(), self.project.clone());
        context.profile = ctx.profile.clone();
        context.domain = ctx.domain.clone();

        match self.hooks.run(HookPoint::PreDeploy, &context).await {
            None => CheckOutcome::Skipped("no pre-deploy hook".to_string()),
            Some(result) if result.success => CheckOutcome::Passed,
            Some(result) => {
                let detail = result.stderr.trim();
                if detail.is_empty() {
                    CheckOutcome::Failed(format!(
                        "pre-deploy hook failed with exit code {:?}",
                        result.exit_code
                    ))
                } else {
                    CheckOutcome::Failed(format!("pre-deploy hook failed: {detail}"))
                }
            }
        }
    }
}
