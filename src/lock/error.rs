// ABOUTME: Error types for local and remote deployment locks.
// ABOUTME: LockHeld carries remaining minutes and recovery instructions.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::types::Stage;

/// Errors from lock operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// An unexpired lock exists for the stage.
    #[error(
        "deployment to '{stage}' is locked by {holder} ({remaining_minutes} minutes remaining, expires {expires_at}). \
         Wait for the lock to expire, or run `stagehand recover {stage}` if the previous deployment is no longer running"
    )]
    Held {
        stage: Stage,
        holder: String,
        remaining_minutes: i64,
        expires_at: DateTime<Utc>,
    },

    /// Another process recreated the lock while a stale one was being broken.
    #[error("lock for '{0}' was acquired by another process while breaking a stale lock")]
    Contended(Stage),

    /// The configured TTL cannot produce a valid lock.
    #[error("invalid lock TTL: {0}")]
    InvalidTtl(String),

    /// Filesystem failure on the lock file or directory.
    #[error("lock file error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lock record could not be serialized.
    #[error("failed to serialize lock record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The remote state backend failed to clear its lock.
    #[error("failed to clear remote lock for '{stage}': {message}")]
    RemoteClear { stage: Stage, message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockErrorKind {
    Held,
    Contended,
    InvalidTtl,
    Io,
    Serialize,
    RemoteClear,
}

impl LockError {
    pub fn kind(&self) -> LockErrorKind {
        match self {
            LockError::Held { .. } => LockErrorKind::Held,
            LockError::Contended(_) => LockErrorKind::Contended,
            LockError::InvalidTtl(_) => LockErrorKind::InvalidTtl,
            LockError::Io { .. } => LockErrorKind::Io,
            LockError::Serialize(_) => LockErrorKind::Serialize,
            LockError::RemoteClear { .. } => LockErrorKind::RemoteClear,
        }
    }

    /// Minutes until the blocking lock expires, if this is a held-lock error.
    pub fn remaining_minutes(&self) -> Option<i64> {
        match self {
            LockError::Held {
                remaining_minutes, ..
            } => Some(*remaining_minutes),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LockError::Io {
            path: path.into(),
            source,
        }
    }
}
