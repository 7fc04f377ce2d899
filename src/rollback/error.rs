// ABOUTME: Recovery error types with SNAFU pattern.
// ABOUTME: Either lock layer failing to clear is surfaced, never swallowed.

use snafu::Snafu;

use crate::lock::LockError;
use crate::types::Stage;

/// A lock layer that could not be cleared during recovery.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RecoveryError {
    #[snafu(display("failed to release file lock for {stage}: {source}"))]
    FileLock { stage: Stage, source: LockError },

    #[snafu(display("failed to clear remote lock for {stage}: {source}"))]
    RemoteLock { stage: Stage, source: LockError },

    #[snafu(display("failed to clear both lock layers for {stage}: {file}; {remote}"))]
    BothLayers {
        stage: Stage,
        file: LockError,
        remote: LockError,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryErrorKind {
    /// The local lock file could not be removed.
    FileLock,
    /// The infrastructure tool refused or failed to unlock.
    RemoteLock,
    /// Neither layer could be cleared.
    BothLayers,
}

impl RecoveryError {
    pub fn kind(&self) -> RecoveryErrorKind {
        match self {
            RecoveryError::FileLock { .. } => RecoveryErrorKind::FileLock,
            RecoveryError::RemoteLock { .. } => RecoveryErrorKind::RemoteLock,
            RecoveryError::BothLayers { .. } => RecoveryErrorKind::BothLayers,
        }
    }

    pub fn stage(&self) -> &Stage {
        match self {
            RecoveryError::FileLock { stage, .. }
            | RecoveryError::RemoteLock { stage, .. }
            | RecoveryError::BothLayers { stage, .. } => stage,
        }
    }
}
