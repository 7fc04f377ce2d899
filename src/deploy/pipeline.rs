// ABOUTME: Deployment pipeline parameterized by phase marker.
// ABOUTME: Each transition consumes self; failures carry the still-held lock out.

use std::marker::PhantomData;
use std::time::Instant;

use crate::checks::CheckContext;
use crate::diagnostics::{Diagnostics, Warning};
use crate::invoke::{BuildOutcome, Invocation};
use crate::lock::DeploymentLock;
use crate::types::Stage;

use super::error::DeployError;
use super::orchestrator::DeploymentOrchestrator;
use super::result::{DeploymentResult, Phase};
use super::state::{CacheInvalidated, Deployed, LockAcquired, Prechecked, Verified};

/// Result type for a pipeline transition.
pub type TransitionResult<'o, T> = Result<Pipeline<'o, T>, PipelineFailure>;

/// A deployment in progress, parameterized by the last completed phase.
///
/// Only `Pipeline<CacheInvalidated>` can release the lock. Every failed
/// transition yields a [`PipelineFailure`] that owns the lock instead,
/// so a failed run cannot release it by accident.
///
/// ```compile_fail
/// use stagehand::deploy::{Deployed, DeploymentResult, Pipeline};
///
/// async fn skip_verification(pipeline: Pipeline<'_, Deployed>) -> DeploymentResult {
///     pipeline.release().await
/// }
/// ```
pub struct Pipeline<'o, S> {
    pub(crate) orchestrator: &'o DeploymentOrchestrator,
    pub(crate) lock: DeploymentLock,
    pub(crate) context: CheckContext,
    pub(crate) invocation: Invocation,
    pub(crate) result: DeploymentResult,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) started: Instant,
    _state: PhantomData<S>,
}

/// A pipeline that stopped before completing.
///
/// The lock stays on disk until it expires or
/// [`crate::rollback::RollbackManager::recover`] clears it.
#[derive(Debug)]
pub struct PipelineFailure {
    pub lock: DeploymentLock,
    pub result: DeploymentResult,
    pub diagnostics: Diagnostics,
    pub error: DeployError,
    pub(crate) started: Instant,
}

impl<'o, S> Pipeline<'o, S> {
    fn transition<T>(self) -> Pipeline<'o, T> {
        Pipeline {
            orchestrator: self.orchestrator,
            lock: self.lock,
            context: self.context,
            invocation: self.invocation,
            result: self.result,
            diagnostics: self.diagnostics,
            started: self.started,
            _state: PhantomData,
        }
    }

    fn fail(self, error: DeployError) -> PipelineFailure {
        tracing::error!(stage = %self.lock.stage, "{error}");
        PipelineFailure {
            lock: self.lock,
            result: self.result,
            diagnostics: self.diagnostics,
            error,
            started: self.started,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.lock.stage
    }

    pub fn lock(&self) -> &DeploymentLock {
        &self.lock
    }

    /// Results collected so far.
    pub fn result(&self) -> &DeploymentResult {
        &self.result
    }
}

impl<'o> Pipeline<'o, LockAcquired> {
    pub(crate) fn start(
        orchestrator: &'o DeploymentOrchestrator,
        lock: DeploymentLock,
        result: DeploymentResult,
        started: Instant,
    ) -> Self {
        let context = orchestrator.check_context(&lock.stage);
        let invocation = orchestrator.invocation(&lock.stage);
        Pipeline {
            orchestrator,
            lock,
            context,
            invocation,
            result,
            diagnostics: Diagnostics::default(),
            started,
            _state: PhantomData,
        }
    }

    /// Run preflight checks in order, stopping at the first failure.
    pub async fn precheck(mut self) -> TransitionResult<'o, Prechecked> {
        let phase = Instant::now();
        tracing::info!(stage = %self.lock.stage, "Running preflight checks");

        let report = self.orchestrator.preflight.run(&mut self.context).await;
        self.result.checks.extend(report.results);
        self.result.record(Phase::Precheck, phase);

        if let Some(failure) = report.failure {
            return Err(self.fail(DeployError::Preflight {
                check: failure.check,
                message: failure.message,
            }));
        }

        self.result.details.git_status_ok = true;
        self.result.details.tests_ok = true;
        Ok(self.transition())
    }
}

impl<'o> Pipeline<'o, Prechecked> {
    /// Back up, build, then run the deploy command.
    pub async fn build_deploy(mut self) -> TransitionResult<'o, Deployed> {
        let orchestrator = self.orchestrator;

        if let Some(backup) = &orchestrator.backup {
            let phase = Instant::now();
            tracing::info!(stage = %self.lock.stage, "Backing up before deploy");
            let outcome = backup.backup(&self.invocation).await;
            self.result.record(Phase::Backup, phase);
            match outcome {
                Ok(path) => {
                    tracing::info!("Backup written to {}", path.display());
                    self.result.details.backup_path = Some(path);
                }
                Err(e) => return Err(self.fail(DeployError::Backup(e))),
            }
        }

        let phase = Instant::now();
        let outcome = orchestrator.build.build(&self.invocation).await;
        self.result.record(Phase::Build, phase);
        match outcome {
            Ok(BuildOutcome::Built) => tracing::info!(stage = %self.lock.stage, "Build complete"),
            Ok(BuildOutcome::Skipped) => tracing::debug!("No build command configured"),
            Err(e) => return Err(self.fail(DeployError::Build(e))),
        }
        self.result.details.builds_ok = true;

        let phase = Instant::now();
        tracing::info!(stage = %self.lock.stage, "Deploying");
        let outcome = orchestrator.deployer.deploy(&self.invocation).await;
        self.result.record(Phase::Deploy, phase);
        if let Err(e) = outcome {
            return Err(self.fail(DeployError::DeployCommand(e)));
        }
        self.result.details.deployment_ok = true;

        Ok(self.transition())
    }
}

impl<'o> Pipeline<'o, Deployed> {
    /// Run postflight checks. Only critical failures stop the pipeline.
    pub async fn postcheck(mut self) -> TransitionResult<'o, Verified> {
        let phase = Instant::now();
        tracing::info!(stage = %self.lock.stage, "Running postflight checks");

        let report = self.orchestrator.postflight.run(&mut self.context).await;
        self.result.checks.extend(report.results);
        self.result.record(Phase::Postcheck, phase);

        for failure in &report.advisory_failures {
            self.diagnostics
                .warn(Warning::advisory_check(&failure.check, &failure.message));
        }

        if let Some(failure) = report.critical_failure {
            return Err(self.fail(DeployError::PostflightCritical {
                check: failure.check,
                message: failure.message,
            }));
        }

        self.result.details.health_checks_ok = true;
        Ok(self.transition())
    }
}

impl<'o> Pipeline<'o, Verified> {
    /// Invalidate the CDN cache. Failure is downgraded to a warning.
    pub async fn invalidate_cache(mut self) -> Pipeline<'o, CacheInvalidated> {
        let orchestrator = self.orchestrator;
        let Some(cache) = &orchestrator.cache else {
            tracing::debug!(stage = %self.lock.stage, "Cache invalidation skipped");
            return self.transition();
        };

        let phase = Instant::now();
        let outcome = cache.invalidate(&self.invocation).await;
        self.result.record(Phase::CacheInvalidate, phase);

        match outcome {
            Ok(()) => {
                tracing::info!(stage = %self.lock.stage, "Cache invalidated");
                self.result.details.cache_invalidated_ok = Some(true);
            }
            Err(e) => {
                self.diagnostics.warn(Warning::cache_invalidation(format!(
                    "cache invalidation failed, content may be stale: {e}"
                )));
                self.result.details.cache_invalidated_ok = Some(false);
            }
        }

        self.transition()
    }
}

impl Pipeline<'_, CacheInvalidated> {
    /// Release the lock and produce the successful result.
    pub async fn release(mut self) -> DeploymentResult {
        let phase = Instant::now();
        if let Err(e) = self.orchestrator.locks.release(&self.lock).await {
            self.diagnostics
                .warn(Warning::lock_release(format!("failed to release lock: {e}")));
        }
        self.result.record(Phase::Release, phase);

        self.orchestrator
            .run_post_deploy_hook(&self.context, &mut self.diagnostics)
            .await;

        let stage = &self.lock.stage;
        tracing::info!(stage = %stage, "Deployment complete");

        let mut result = self.result;
        result.success = true;
        result.message = format!("Deployed {stage} successfully");
        result.warnings = self.diagnostics.messages();
        result.finish(self.started);
        result
    }
}
