// ABOUTME: Two-layer deployment locking: local marker files plus the remote state lock.
// ABOUTME: Exports LockManager, lock records, backend trait and errors.

mod backend;
mod error;
mod manager;
mod record;

pub use backend::{
    BackendError, CliLockBackend, LockBackend, RemoteLockState, classify_unlock_output,
};
pub use error::{LockError, LockErrorKind};
pub use manager::{DEFAULT_PROBE_TIMEOUT, LOCK_DIR, LockManager};
pub use record::{DEFAULT_LOCK_TTL, DeploymentLock, LockTtl};
