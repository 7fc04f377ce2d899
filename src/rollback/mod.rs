// ABOUTME: Recovery, lock status and failure guidance for stages.
// ABOUTME: Independent of the orchestrator; shares only the LockManager.

mod error;
mod guidance;
mod manager;

pub use error::{RecoveryError, RecoveryErrorKind};
pub use guidance::{Guidance, GuidanceCategory, classify, provide_rollback_guidance};
pub use manager::{FileLockState, LockStatus, RecoveryReport, RollbackManager};
