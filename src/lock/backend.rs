// ABOUTME: Remote lock backend abstraction over the infra tool's native state lock.
// ABOUTME: Classifies unlock output into Locked / Unlocked / Unknown.

use async_trait::async_trait;
use std::sync::Arc;

use crate::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::types::Stage;

/// Observed state of the lock owned by the external state backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteLockState {
    Locked,
    Unlocked,
    /// Ambiguous output, timeout, or probe failure.
    Unknown,
}

impl RemoteLockState {
    /// Only a definite `Locked` blocks a deployment; `Unknown` is treated as unlocked.
    pub fn blocks_deploy(self) -> bool {
        matches!(self, RemoteLockState::Locked)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("unlock command failed: {0}")]
    UnlockFailed(String),
}

/// Access to the remote lock primitive. This crate never creates remote locks.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Inspect the remote lock for a stage.
    async fn probe(&self, stage: &Stage) -> Result<RemoteLockState, BackendError>;

    /// Request that the remote lock for a stage be cleared.
    async fn clear(&self, stage: &Stage) -> Result<(), BackendError>;
}

const UNLOCKED_SENTINELS: &[&str] = &["no lock", "not locked", "nothing to unlock", "no active lock"];
const LOCK_ACTIONS: &[&str] = &["removed", "released", "cleared", "unlocked", "locked", "held"];

/// Classify the text printed by an unlock-style command.
pub fn classify_unlock_output(text: &str) -> RemoteLockState {
    let text = text.to_lowercase();

    if UNLOCKED_SENTINELS.iter().any(|s| text.contains(s)) {
        return RemoteLockState::Unlocked;
    }

    if text.contains("lock") && LOCK_ACTIONS.iter().any(|k| text.contains(k)) {
        return RemoteLockState::Locked;
    }

    RemoteLockState::Unknown
}

/// Lock backend driven through the infra tool's `unlock` subcommand.
///
/// Probing runs the unlock command itself: the tool offers no read-only
/// query, and clearing a lock the caller is about to clear anyway is harmless.
pub struct CliLockBackend {
    runner: Arc<dyn CommandRunner>,
    tool: CommandSpec,
    profile: Option<String>,
}

impl CliLockBackend {
    /// `tool` is the infra tool invocation prefix, e.g. `npx sst`.
    pub fn new(runner: Arc<dyn CommandRunner>, tool: CommandSpec) -> Self {
        Self {
            runner,
            tool,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    fn unlock_command(&self, stage: &Stage) -> CommandSpec {
        self.tool
            .clone()
            .arg("unlock")
            .arg("--stage")
            .arg(stage.as_str())
            .profile(self.profile.as_deref())
    }

    async fn run_unlock(&self, stage: &Stage) -> Result<CommandOutput, BackendError> {
        Ok(self.runner.run(&self.unlock_command(stage)).await?)
    }
}

#[async_trait]
impl LockBackend for CliLockBackend {
    async fn probe(&self, stage: &Stage) -> Result<RemoteLockState, BackendError> {
        let output = self.run_unlock(stage).await?;
        let state = classify_unlock_output(&output.combined());
        tracing::debug!("Remote lock probe for {} classified as {:?}", stage, state);
        Ok(state)
    }

    async fn clear(&self, stage: &Stage) -> Result<(), BackendError> {
        let output = self.run_unlock(stage).await?;
        if output.success() {
            return Ok(());
        }

        // Clearing an already clear lock exits non-zero in some backends.
        if classify_unlock_output(&output.combined()) == RemoteLockState::Unlocked {
            return Ok(());
        }

        Err(BackendError::UnlockFailed(output.failure_summary()))
    }
}
