// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup and in-memory fakes for external collaborators.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use stagehand::checks::{Check, CheckContext, CheckOutcome, Severity};
use stagehand::invoke::{
    BuildInvoker, BuildOutcome, CacheInvalidator, DeployInvoker, InvokeError, Invocation,
};
use stagehand::lock::{BackendError, LockBackend, LockManager, RemoteLockState};
use stagehand::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use stagehand::types::Stage;
use std::path::Path;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("stagehand=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn staging() -> Stage {
    Stage::new("staging").unwrap()
}

/// In-memory remote lock.
#[derive(Default)]
pub struct FakeBackend {
    pub state: Mutex<Option<RemoteLockState>>,
    pub fail_clear: Mutex<bool>,
    pub probe_delay: Option<Duration>,
    pub probes: AtomicUsize,
    pub clears: AtomicUsize,
}

impl FakeBackend {
    pub fn with_state(state: RemoteLockState) -> Self {
        let backend = Self::default();
        *backend.state.lock() = Some(state);
        backend
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockBackend for FakeBackend {
    async fn probe(&self, _stage: &Stage) -> Result<RemoteLockState, BackendError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        Ok((*self.state.lock()).unwrap_or(RemoteLockState::Unlocked))
    }

    async fn clear(&self, _stage: &Stage) -> Result<(), BackendError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if *self.fail_clear.lock() {
            return Err(BackendError::UnlockFailed("state bucket unreachable".to_string()));
        }
        *self.state.lock() = Some(RemoteLockState::Unlocked);
        Ok(())
    }
}

pub fn lock_manager(root: &Path, backend: Arc<FakeBackend>) -> Arc<LockManager> {
    Arc::new(LockManager::new(root, backend))
}

/// Runner that answers from a table of program prefixes and records every call.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<Vec<(String, CommandOutput)>>,
    pub calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    /// Reply to any command whose display form starts with `prefix`.
    pub fn respond(self, prefix: &str, exit_code: i32, stdout: &str) -> Self {
        self.responses.lock().push((
            prefix.to_string(),
            CommandOutput {
                exit_code: Some(exit_code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.to_string()).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().push(command.clone());
        let line = command.to_string();
        let responses = self.responses.lock();
        let output = responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or(CommandOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            });
        Ok(output)
    }
}

fn failed(what: &str) -> InvokeError {
    InvokeError::Failed {
        command: what.to_string(),
        status: "exit code 1".to_string(),
        message: format!("{what} exploded"),
    }
}

/// Deploy invoker that counts calls and optionally fails.
#[derive(Default)]
pub struct FakeDeploy {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl FakeDeploy {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl DeployInvoker for FakeDeploy {
    async fn deploy(&self, _invocation: &Invocation) -> Result<(), InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(failed("sst deploy"))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct FakeBuild {
    pub fail: bool,
}

#[async_trait]
impl BuildInvoker for FakeBuild {
    async fn build(&self, _invocation: &Invocation) -> Result<BuildOutcome, InvokeError> {
        if self.fail {
            Err(failed("npm run build"))
        } else {
            Ok(BuildOutcome::Built)
        }
    }
}

#[derive(Default)]
pub struct FakeCache {
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CacheInvalidator for FakeCache {
    async fn invalidate(&self, _invocation: &Invocation) -> Result<(), InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(failed("aws cloudfront create-invalidation"))
        } else {
            Ok(())
        }
    }
}

/// Check with a fixed outcome.
pub struct FixedCheck {
    pub name: &'static str,
    pub severity: Severity,
    pub outcome: CheckOutcome,
    pub calls: Arc<AtomicUsize>,
}

impl FixedCheck {
    pub fn passing(name: &'static str) -> Self {
        Self::new(name, Severity::Critical, CheckOutcome::Passed)
    }

    pub fn failing(name: &'static str, severity: Severity, message: &str) -> Self {
        Self::new(name, severity, CheckOutcome::Failed(message.to_string()))
    }

    pub fn new(name: &'static str, severity: Severity, outcome: CheckOutcome) -> Self {
        Self {
            name,
            severity,
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Check for FixedCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
