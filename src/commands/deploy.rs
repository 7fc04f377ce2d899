// ABOUTME: Deploy command implementation.
// ABOUTME: Runs the orchestrator for one stage and maps the result to an exit code.

use stagehand::bootstrap;
use stagehand::config::Config;
use stagehand::error::Result;
use stagehand::output::{Output, OutputMode};
use stagehand::process::{CommandRunner, ProcessRunner};
use stagehand::rollback::provide_rollback_guidance;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

pub async fn deploy(project_root: &Path, stage: &str, mut output: Output) -> Result<ExitCode> {
    let config = Config::discover(project_root)?;
    let settings = config.for_stage(stage)?;

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let locks = bootstrap::lock_manager(&settings, project_root, runner.clone())?;
    let orchestrator = bootstrap::orchestrator(&settings, project_root, runner, locks.clone())?;

    output.start_timer();
    output.progress(&format!(
        "Deploying {} to {}",
        settings.project, settings.stage
    ));

    let result = orchestrator.deploy(&settings.stage).await;
    output.deployment(&result);

    if result.success {
        return Ok(ExitCode::SUCCESS);
    }

    if output.mode() != OutputMode::Json
        && let Some(ref error) = result.error
    {
        if result.lock_retained {
            eprintln!();
            eprintln!("The {} lock is still held. Options:", settings.stage);
            eprintln!(
                "  - wait for it to expire ({} min TTL)",
                locks.ttl().minutes()
            );
            eprintln!("  - fix the cause, then `stagehand recover {}` and redeploy", settings.stage);
        }
        eprintln!();
        for guidance in provide_rollback_guidance(&settings.stage, error) {
            eprintln!("{guidance}");
        }
    }

    Ok(ExitCode::FAILURE)
}
