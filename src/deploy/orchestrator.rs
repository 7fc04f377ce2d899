// ABOUTME: Drives one stage deployment through lock, checks, build, deploy and release.
// ABOUTME: Never returns an error; every outcome is a DeploymentResult.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::checks::{CheckContext, PostflightRunner, PreflightRunner};
use crate::diagnostics::{Diagnostics, Warning};
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::invoke::{
    BackupInvoker, BuildInvoker, CacheInvalidator, CommandBuild, DeployInvoker, Invocation,
};
use crate::lock::LockManager;
use crate::process::ProcessRunner;
use crate::types::Stage;

use super::error::DeployError;
use super::pipeline::{Pipeline, PipelineFailure, TransitionResult};
use super::result::{DeploymentResult, Phase};
use super::state::{LockAcquired, Verified};

const DEFAULT_LOCK_REASON: &str = "stagehand deploy";

/// Sequences the deployment phases for a stage.
///
/// Collaborators are trait objects so tests can substitute fakes for the
/// infrastructure tool, the CDN and the check commands.
pub struct DeploymentOrchestrator {
    pub(crate) locks: Arc<LockManager>,
    pub(crate) preflight: PreflightRunner,
    pub(crate) postflight: PostflightRunner,
    pub(crate) build: Box<dyn BuildInvoker>,
    pub(crate) deployer: Box<dyn DeployInvoker>,
    pub(crate) cache: Option<Box<dyn CacheInvalidator>>,
    pub(crate) backup: Option<Box<dyn BackupInvoker>>,
    hooks: Option<Arc<HookRunner>>,
    project_root: PathBuf,
    project_name: String,
    domain: Option<String>,
    profile: Option<String>,
    env: BTreeMap<String, String>,
    reason: String,
}

impl DeploymentOrchestrator {
    /// Create an orchestrator with no checks, no build step and no cache.
    pub fn new(
        locks: Arc<LockManager>,
        deployer: Box<dyn DeployInvoker>,
        project_root: &Path,
    ) -> Self {
        let project_name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());

        Self {
            locks,
            preflight: PreflightRunner::default(),
            postflight: PostflightRunner::default(),
            build: Box::new(CommandBuild::new(Arc::new(ProcessRunner), None)),
            deployer,
            cache: None,
            backup: None,
            hooks: None,
            project_root: project_root.to_path_buf(),
            project_name,
            domain: None,
            profile: None,
            env: BTreeMap::new(),
            reason: DEFAULT_LOCK_REASON.to_string(),
        }
    }

    pub fn with_preflight(mut self, preflight: PreflightRunner) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn with_postflight(mut self, postflight: PostflightRunner) -> Self {
        self.postflight = postflight;
        self
    }

    pub fn with_build(mut self, build: Box<dyn BuildInvoker>) -> Self {
        self.build = build;
        self
    }

    pub fn with_cache_invalidator(mut self, cache: Option<Box<dyn CacheInvalidator>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_backup(mut self, backup: Option<Box<dyn BackupInvoker>>) -> Self {
        self.backup = backup;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<HookRunner>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Reason recorded in the lock file.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub(crate) fn check_context(&self, stage: &Stage) -> CheckContext {
        CheckContext::new(stage.clone(), &self.project_root)
            .with_domain(self.domain.clone())
            .with_profile(self.profile.clone())
    }

    pub(crate) fn invocation(&self, stage: &Stage) -> Invocation {
        Invocation::new(stage.clone(), &self.project_root)
            .with_profile(self.profile.clone())
            .with_env(self.env.clone())
    }

    fn hook_context(&self, stage: &Stage) -> HookContext {
        let mut context = HookContext::new(stage.clone(), self.project_name.clone());
        context.profile = self.profile.clone();
        context.domain = self.domain.clone();
        context
    }

    /// Deploy a stage.
    ///
    /// On success the lock is released. On any failure after the lock was
    /// taken, the lock is deliberately left in place and the result says so;
    /// `RollbackManager::recover` clears it once the operator has looked.
    pub async fn deploy(&self, stage: &Stage) -> DeploymentResult {
        let started = Instant::now();
        let mut result = DeploymentResult::started(stage);
        tracing::info!(stage = %stage, "Starting deployment");

        let phase = Instant::now();
        self.locks.check_and_clean_remote_lock(stage).await;
        let acquired = self.locks.acquire(stage, &self.reason).await;
        result.record(Phase::LockCheck, phase);

        let lock = match acquired {
            Ok(lock) => lock,
            Err(e) => return self.lock_failed(stage, result, DeployError::from(e), started).await,
        };

        let pipeline = Pipeline::start(self, lock, result, started);
        match run_to_verified(pipeline).await {
            Ok(verified) => verified.invalidate_cache().await.release().await,
            Err(failure) => self.pipeline_failed(failure).await,
        }
    }

    async fn lock_failed(
        &self,
        stage: &Stage,
        mut result: DeploymentResult,
        error: DeployError,
        started: Instant,
    ) -> DeploymentResult {
        tracing::error!(stage = %stage, "{error}");
        let mut diagnostics = Diagnostics::default();
        self.run_error_hook(stage, &error, &mut diagnostics).await;

        result.message = format!("Deployment to {stage} did not start");
        result.error = Some(error.to_string());
        result.warnings = diagnostics.messages();
        result.finish(started);
        result
    }

    async fn pipeline_failed(&self, failure: PipelineFailure) -> DeploymentResult {
        let PipelineFailure {
            lock,
            mut result,
            mut diagnostics,
            error,
            started,
        } = failure;
        let stage = &lock.stage;

        tracing::warn!(
            stage = %stage,
            lock = %self.locks.lock_path(stage).display(),
            "Lock retained after failed deployment"
        );
        self.run_error_hook(stage, &error, &mut diagnostics).await;

        let phase = result.last_phase().map(|p| p.name()).unwrap_or("unknown");
        result.message = format!(
            "Deployment to {stage} failed during {phase}; lock retained, run `stagehand recover {stage}` once resolved"
        );
        result.error = Some(error.to_string());
        result.lock_retained = true;
        result.warnings = diagnostics.messages();
        result.finish(started);
        result
    }

    async fn run_error_hook(&self, stage: &Stage, error: &DeployError, diagnostics: &mut Diagnostics) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        let mut context = self.hook_context(stage);
        context.error = Some(error.to_string());

        if let Some(result) = hooks.run(HookPoint::OnError, &context).await
            && !result.success
        {
            diagnostics.warn(Warning::hook(format!(
                "on-error hook failed with exit code {:?}",
                result.exit_code
            )));
        }
    }

    pub(crate) async fn run_post_deploy_hook(
        &self,
        ctx: &CheckContext,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        let context = self.hook_context(&ctx.stage);

        if let Some(result) = hooks.run(HookPoint::PostDeploy, &context).await
            && !result.success
        {
            diagnostics.warn(Warning::hook(format!(
                "post-deploy hook failed with exit code {:?}",
                result.exit_code
            )));
        }
    }
}

async fn run_to_verified(
    pipeline: Pipeline<'_, LockAcquired>,
) -> TransitionResult<'_, Verified> {
    pipeline
        .precheck()
        .await?
        .build_deploy()
        .await?
        .postcheck()
        .await
}
