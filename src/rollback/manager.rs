// ABOUTME: Out-of-band recovery and inspection of both lock layers.
// ABOUTME: Works without a live orchestrator; only touches locks through LockManager.

use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::ResultExt;
use std::sync::Arc;

use crate::lock::{DeploymentLock, LockManager};
use crate::types::Stage;

use super::error::{BothLayersSnafu, FileLockSnafu, RecoveryError, RemoteLockSnafu};
use super::guidance::{Guidance, provide_rollback_guidance};

/// Classification of the local lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileLockState {
    None,
    Active {
        #[serde(rename = "remainingMinutes")]
        remaining_minutes: i64,
    },
    Stale {
        #[serde(rename = "expiredMinutesAgo")]
        expired_minutes_ago: i64,
    },
}

/// Read-only view of a stage's lock layers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub stage: Stage,
    pub remote_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_lock: Option<DeploymentLock>,
    pub state: FileLockState,
}

impl LockStatus {
    pub fn classify(
        stage: Stage,
        remote_locked: bool,
        file_lock: Option<DeploymentLock>,
        now: DateTime<Utc>,
    ) -> Self {
        let state = match &file_lock {
            None => FileLockState::None,
            Some(lock) if lock.is_expired_at(now) => FileLockState::Stale {
                expired_minutes_ago: lock.expired_minutes_ago_at(now),
            },
            Some(lock) => FileLockState::Active {
                remaining_minutes: lock.remaining_minutes_at(now),
            },
        };

        Self {
            stage,
            remote_locked,
            file_lock,
            state,
        }
    }

    /// Whether a deploy would be refused. Remote locks are cleared on deploy, so only the file counts.
    pub fn is_blocked(&self) -> bool {
        matches!(self.state, FileLockState::Active { .. })
    }
}

/// What `recover` found and cleared.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub stage: Stage,
    /// The parsed lock record that was removed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<DeploymentLock>,
    pub remote_cleared: bool,
}

#[derive(Debug, Clone)]
pub struct RollbackManager {
    locks: Arc<LockManager>,
}

impl RollbackManager {
    pub fn new(locks: Arc<LockManager>) -> Self {
        Self { locks }
    }

    /// Clear both lock layers for a stage.
    ///
    /// The layers are independent after a crash, so the remote clear is
    /// attempted even when the file lock is absent or cannot be removed.
    pub async fn recover(&self, stage: &Stage) -> Result<RecoveryReport, RecoveryError> {
        let released = self.locks.file_lock(stage).await;
        if let Some(lock) = &released {
            tracing::info!(
                "Releasing lock for {} held by {} since {}",
                stage,
                lock.holder_description(),
                lock.created_at
            );
        }

        let file_result = self.locks.release_stage(stage).await;
        let remote_result = self.locks.try_clear_remote_lock(stage).await;

        match (file_result, remote_result) {
            (Ok(()), Ok(())) => {}
            (Err(file), Ok(())) => {
                return Err(file).context(FileLockSnafu {
                    stage: stage.clone(),
                });
            }
            (Ok(()), Err(remote)) => {
                return Err(remote).context(RemoteLockSnafu {
                    stage: stage.clone(),
                });
            }
            (Err(file), Err(remote)) => {
                return BothLayersSnafu {
                    stage: stage.clone(),
                    file,
                    remote,
                }
                .fail();
            }
        }

        tracing::info!("Recovered {}", stage);
        Ok(RecoveryReport {
            stage: stage.clone(),
            released,
            remote_cleared: true,
        })
    }

    /// Report both lock layers. The file lock is only read, but the remote
    /// probe of [`crate::lock::CliLockBackend`] runs the tool's unlock command
    /// and can clear a held remote lock as a side effect.
    pub async fn status(&self, stage: &Stage) -> LockStatus {
        let (remote_locked, file_lock) = tokio::join!(
            self.locks.is_remote_locked(stage),
            self.locks.file_lock(stage)
        );
        LockStatus::classify(stage.clone(), remote_locked, file_lock, Utc::now())
    }

    pub fn guidance(&self, stage: &Stage, error_message: &str) -> Vec<Guidance> {
        provide_rollback_guidance(stage, error_message)
    }
}
