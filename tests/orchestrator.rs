// ABOUTME: Integration tests for the deployment orchestrator.
// ABOUTME: Drives full deployments against in-memory fakes and inspects the result.

mod support;

use stagehand::checks::{PostflightRunner, PreflightRunner, Severity};
use stagehand::deploy::{
    CacheInvalidated, DeploymentOrchestrator, DeploymentResult, Phase, Pipeline,
};
use stagehand::invoke::{BackupInvoker, InvokeError, Invocation};
use stagehand::lock::{LockManager, RemoteLockState};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use support::{FakeBackend, FakeBuild, FakeCache, FakeDeploy, FixedCheck, lock_manager, staging};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    locks: Arc<LockManager>,
    backend: Arc<FakeBackend>,
}

impl Harness {
    fn new() -> Self {
        support::init_tracing();
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let locks = lock_manager(dir.path(), backend.clone());
        Self {
            _dir: dir,
            locks,
            backend,
        }
    }

    fn orchestrator(&self, deployer: FakeDeploy) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(self.locks.clone(), Box::new(deployer), self._dir.path())
            .with_build(Box::new(FakeBuild::default()))
    }
}

/// Compiles only if a fully verified pipeline can be released.
#[allow(dead_code)]
async fn release_after_cache(pipeline: Pipeline<'_, CacheInvalidated>) -> DeploymentResult {
    pipeline.release().await
}

#[tokio::test]
async fn successful_deploy_sets_every_flag_and_releases_lock() {
    let h = Harness::new();
    let cache = FakeCache::default();
    let cache_calls = cache.calls.clone();
    let orchestrator = h
        .orchestrator(FakeDeploy::default())
        .with_preflight(PreflightRunner::new(vec![Box::new(FixedCheck::passing("lint"))]))
        .with_postflight(PostflightRunner::new(vec![Box::new(FixedCheck::passing("smoke"))]))
        .with_cache_invalidator(Some(Box::new(cache)));

    let result = orchestrator.deploy(&staging()).await;

    assert!(result.success, "{result:?}");
    assert!(result.error.is_none());
    assert!(!result.lock_retained);
    assert!(result.message.contains("staging"));
    let details = &result.details;
    assert!(details.git_status_ok);
    assert!(details.tests_ok);
    assert!(details.builds_ok);
    assert!(details.deployment_ok);
    assert!(details.health_checks_ok);
    assert_eq!(details.cache_invalidated_ok, Some(true));
    assert_eq!(cache_calls.load(Ordering::SeqCst), 1);
    assert!(h.locks.file_lock(&staging()).await.is_none());
    assert!(result.end_time >= result.start_time);
}

#[tokio::test]
async fn deploy_failure_retains_lock() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(FakeDeploy::failing());

    let result = orchestrator.deploy(&staging()).await;

    assert!(!result.success);
    assert!(result.lock_retained);
    assert!(result.details.builds_ok);
    assert!(!result.details.deployment_ok);
    assert!(!result.details.health_checks_ok);
    assert!(result.error.as_deref().unwrap().contains("sst deploy"));
    assert!(result.message.contains("stagehand recover staging"));
    assert!(h.locks.file_lock(&staging()).await.is_some());

    let second = orchestrator.deploy(&staging()).await;
    assert!(!second.success);
    assert!(!second.lock_retained);
}

#[tokio::test]
async fn build_failure_never_reaches_deploy() {
    let h = Harness::new();
    let deployer = FakeDeploy::default();
    let calls = deployer.calls.clone();
    let orchestrator = h
        .orchestrator(deployer)
        .with_build(Box::new(FakeBuild { fail: true }));

    let result = orchestrator.deploy(&staging()).await;

    assert!(!result.success);
    assert!(!result.details.builds_ok);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.last_phase(), Some(Phase::Build));
    assert!(result.lock_retained);
}

#[tokio::test]
async fn preflight_failure_stops_before_deploy() {
    let h = Harness::new();
    let deployer = FakeDeploy::default();
    let calls = deployer.calls.clone();
    let later = FixedCheck::passing("tests");
    let later_calls = later.calls.clone();
    let orchestrator = h.orchestrator(deployer).with_preflight(PreflightRunner::new(vec![
        Box::new(FixedCheck::failing("git-status", Severity::Critical, "uncommitted changes")),
        Box::new(later),
    ]));

    let result = orchestrator.deploy(&staging()).await;

    assert!(!result.success);
    assert!(!result.details.git_status_ok);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.checks.len(), 1);
    assert!(!result.checks[0].passed);
    assert!(result.error.as_deref().unwrap().contains("git-status"));
    assert!(h.locks.file_lock(&staging()).await.is_some());
}

#[tokio::test]
async fn cache_failure_is_only_a_warning() {
    let h = Harness::new();
    let orchestrator = h
        .orchestrator(FakeDeploy::default())
        .with_cache_invalidator(Some(Box::new(FakeCache {
            fail: true,
            ..FakeCache::default()
        })));

    let result = orchestrator.deploy(&staging()).await;

    assert!(result.success);
    assert_eq!(result.details.cache_invalidated_ok, Some(false));
    assert!(result.warnings.iter().any(|w| w.contains("cache invalidation failed")));
    assert!(h.locks.file_lock(&staging()).await.is_none());
}

#[tokio::test]
async fn missing_cache_config_leaves_flag_unset() {
    let h = Harness::new();
    let result = h.orchestrator(FakeDeploy::default()).deploy(&staging()).await;

    assert!(result.success);
    assert_eq!(result.details.cache_invalidated_ok, None);
    assert!(result.timing(Phase::CacheInvalidate).is_none());
}

#[tokio::test]
async fn critical_postflight_failure_fails_and_retains_lock() {
    let h = Harness::new();
    let orchestrator = h
        .orchestrator(FakeDeploy::default())
        .with_postflight(PostflightRunner::new(vec![Box::new(FixedCheck::failing(
            "health",
            Severity::Critical,
            "503 after 5 attempts",
        ))]));

    let result = orchestrator.deploy(&staging()).await;

    assert!(!result.success);
    assert!(result.details.deployment_ok);
    assert!(!result.details.health_checks_ok);
    assert!(result.lock_retained);
    assert_eq!(result.last_phase(), Some(Phase::Postcheck));
    assert!(h.locks.file_lock(&staging()).await.is_some());
}

#[tokio::test]
async fn advisory_postflight_failure_only_warns() {
    let h = Harness::new();
    let orchestrator = h
        .orchestrator(FakeDeploy::default())
        .with_postflight(PostflightRunner::new(vec![
            Box::new(FixedCheck::failing(
                "domain-config",
                Severity::Advisory,
                "DNS not propagated",
            )),
            Box::new(FixedCheck::passing("health")),
        ]));

    let result = orchestrator.deploy(&staging()).await;

    assert!(result.success);
    assert!(result.details.health_checks_ok);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("domain-config"));
    assert_eq!(result.checks.len(), 2);
}

#[tokio::test]
async fn held_lock_is_not_reported_as_retained() {
    let h = Harness::new();
    h.locks.acquire(&staging(), "someone else").await.unwrap();
    let deployer = FakeDeploy::default();
    let calls = deployer.calls.clone();

    let result = h.orchestrator(deployer).deploy(&staging()).await;

    assert!(!result.success);
    assert!(!result.lock_retained);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(result.error.as_deref().unwrap().contains("minutes remaining"));
    assert_eq!(h.locks.file_lock(&staging()).await.unwrap().reason, "someone else");
}

#[tokio::test]
async fn remote_lock_is_cleared_before_acquiring() {
    let h = Harness::new();
    *h.backend.state.lock() = Some(RemoteLockState::Locked);

    let result = h.orchestrator(FakeDeploy::default()).deploy(&staging()).await;

    assert!(result.success);
    assert_eq!(h.backend.clear_count(), 1);
}

#[tokio::test]
async fn timings_cover_each_phase_that_ran() {
    let h = Harness::new();
    let result = h
        .orchestrator(FakeDeploy::default())
        .with_cache_invalidator(Some(Box::new(FakeCache::default())))
        .deploy(&staging())
        .await;

    for phase in [
        Phase::LockCheck,
        Phase::Precheck,
        Phase::Build,
        Phase::Deploy,
        Phase::Postcheck,
        Phase::CacheInvalidate,
        Phase::Release,
    ] {
        assert!(result.timing(phase).is_some(), "missing timing for {phase:?}");
    }
    assert!(result.timing(Phase::Backup).is_none());
    assert!(result.duration_seconds >= 0.0);
}

struct FakeBackup {
    fail: bool,
}

#[async_trait::async_trait]
impl BackupInvoker for FakeBackup {
    async fn backup(&self, invocation: &Invocation) -> Result<PathBuf, InvokeError> {
        if self.fail {
            Err(InvokeError::Failed {
                command: "pg_dump".to_string(),
                status: "exit code 1".to_string(),
                message: "connection refused".to_string(),
            })
        } else {
            Ok(invocation.project_root.join("backups/staging.sql"))
        }
    }
}

#[tokio::test]
async fn backup_path_is_recorded() {
    let h = Harness::new();
    let result = h
        .orchestrator(FakeDeploy::default())
        .with_backup(Some(Box::new(FakeBackup { fail: false })))
        .deploy(&staging())
        .await;

    assert!(result.success);
    let path = result.details.backup_path.as_ref().unwrap();
    assert!(path.ends_with("backups/staging.sql"));
}

#[tokio::test]
async fn backup_failure_aborts_before_build() {
    let h = Harness::new();
    let deployer = FakeDeploy::default();
    let calls = deployer.calls.clone();
    let result = h
        .orchestrator(deployer)
        .with_backup(Some(Box::new(FakeBackup { fail: true })))
        .deploy(&staging())
        .await;

    assert!(!result.success);
    assert!(!result.details.builds_ok);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(result.lock_retained);
}

#[tokio::test]
async fn result_serializes_in_camel_case() {
    let h = Harness::new();
    let result = h.orchestrator(FakeDeploy::default()).deploy(&staging()).await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["stage"], "staging");
    assert!(json.get("durationSeconds").is_some());
    assert!(json["details"].get("deploymentOk").is_some());
    assert!(json["details"].get("cacheInvalidatedOk").is_none());
}
