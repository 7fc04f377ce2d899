// ABOUTME: Recover, status and guidance command implementations.
// ABOUTME: Thin wrappers around RollbackManager for the CLI.

use stagehand::bootstrap;
use stagehand::config::Config;
use stagehand::error::Result;
use stagehand::output::Output;
use stagehand::process::ProcessRunner;
use stagehand::rollback::provide_rollback_guidance;
use stagehand::types::Stage;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

pub async fn recover(project_root: &Path, stage: &str, output: Output) -> Result<ExitCode> {
    let config = Config::discover(project_root)?;
    let settings = config.for_stage(stage)?;
    let rollback = bootstrap::rollback_manager(&settings, project_root, Arc::new(ProcessRunner))?;

    output.progress(&format!("Recovering {}", settings.stage));
    let report = rollback.recover(&settings.stage).await?;
    output.recovery(&report);
    Ok(ExitCode::SUCCESS)
}

pub async fn status(project_root: &Path, stage: &str, output: Output) -> Result<ExitCode> {
    let config = Config::discover(project_root)?;
    let settings = config.for_stage(stage)?;
    let rollback = bootstrap::rollback_manager(&settings, project_root, Arc::new(ProcessRunner))?;

    let status = rollback.status(&settings.stage).await;
    output.status(&status);
    Ok(ExitCode::SUCCESS)
}

/// Needs no config; the stage name only appears in the text.
pub fn guidance(stage: &str, message: &str, output: Output) -> Result<ExitCode> {
    let stage = Stage::new(stage)?;
    output.guidance(&provide_rollback_guidance(&stage, message));
    Ok(ExitCode::SUCCESS)
}
