// ABOUTME: Error types for deployment pipeline phases.
// ABOUTME: Every variant except Lock means the stage lock is retained for recovery.

use crate::invoke::InvokeError;
use crate::lock::{LockError, LockErrorKind};

/// Errors that abort a deployment pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The stage lock could not be acquired.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// A preflight check failed before any infrastructure change.
    #[error("preflight check '{check}' failed: {message}")]
    Preflight { check: String, message: String },

    /// The pre-deploy backup failed.
    #[error("backup failed: {0}")]
    Backup(#[source] InvokeError),

    /// The build step failed.
    #[error("build failed: {0}")]
    Build(#[source] InvokeError),

    /// The deploy command failed; infrastructure may be partially applied.
    #[error("deploy command failed: {0}")]
    DeployCommand(#[source] InvokeError),

    /// Domain configuration is broken after deploying.
    #[error("postflight check '{check}' failed: {message}")]
    PostflightCritical { check: String, message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    LockHeld,
    Lock,
    Preflight,
    Backup,
    Build,
    DeployCommand,
    PostflightCritical,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Lock(e) if e.kind() == LockErrorKind::Held => DeployErrorKind::LockHeld,
            DeployError::Lock(_) => DeployErrorKind::Lock,
            DeployError::Preflight { .. } => DeployErrorKind::Preflight,
            DeployError::Backup(_) => DeployErrorKind::Backup,
            DeployError::Build(_) => DeployErrorKind::Build,
            DeployError::DeployCommand(_) => DeployErrorKind::DeployCommand,
            DeployError::PostflightCritical { .. } => DeployErrorKind::PostflightCritical,
        }
    }

    /// Whether infrastructure may have been changed before the failure.
    pub fn infra_touched(&self) -> bool {
        matches!(
            self,
            DeployError::Build(_) | DeployError::DeployCommand(_) | DeployError::PostflightCritical { .. }
        )
    }
}
