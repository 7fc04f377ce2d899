// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the orchestrator, pipeline phases and the structured result.

mod error;
mod orchestrator;
mod pipeline;
mod result;
mod state;

pub use error::{DeployError, DeployErrorKind};
pub use orchestrator::DeploymentOrchestrator;
pub use pipeline::{Pipeline, PipelineFailure, TransitionResult};
pub use result::{DeploymentDetails, DeploymentResult, Phase, StageTiming};
pub use state::{CacheInvalidated, Deployed, LockAcquired, Prechecked, Verified};
