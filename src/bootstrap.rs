// ABOUTME: Wires configuration into lock manager, check runners and orchestrator.
// ABOUTME: All collaborators share one CommandRunner so tests can swap it out.

use std::path::Path;
use std::sync::Arc;

use crate::checks::{
    CertificateCheck, CommandCheck, CredentialsCheck, DomainConfigCheck, GitStatusCheck,
    HealthCheck, OriginSecurityCheck, PostflightRunner, PreflightRunner, Severity, TestSuiteCheck,
};
use crate::config::{StageSettings, resolve_env_map};
use crate::deploy::DeploymentOrchestrator;
use crate::error::{Error, Result};
use crate::hooks::{HookRunner, PreDeployHookCheck};
use crate::invoke::{
    BackupInvoker, CacheInvalidator, CloudFrontInvalidator, CommandBackup, CommandBuild,
    CommandDeploy, DeployCommand,
};
use crate::lock::{CliLockBackend, LockManager, LockTtl};
use crate::process::{CommandRunner, CommandSpec};
use crate::rollback::RollbackManager;

fn infra_tool(settings: &StageSettings) -> Result<CommandSpec> {
    CommandSpec::from_prefix(&settings.infra_tool)
        .ok_or_else(|| Error::InvalidConfig("infra_tool cannot be empty".to_string()))
}

/// Lock manager scoped to the project root, with the stage's TTL.
pub fn lock_manager(
    settings: &StageSettings,
    project_root: &Path,
    runner: Arc<dyn CommandRunner>,
) -> Result<Arc<LockManager>> {
    let backend =
        CliLockBackend::new(runner, infra_tool(settings)?).with_profile(settings.profile.clone());
    let ttl = LockTtl::new(settings.lock_ttl)?;

    Ok(Arc::new(
        LockManager::new(project_root, Arc::new(backend))
            .with_ttl(ttl)
            .with_probe_timeout(settings.probe_timeout),
    ))
}

pub fn rollback_manager(
    settings: &StageSettings,
    project_root: &Path,
    runner: Arc<dyn CommandRunner>,
) -> Result<RollbackManager> {
    Ok(RollbackManager::new(lock_manager(
        settings,
        project_root,
        runner,
    )?))
}

/// Preflight checks in execution order.
pub fn preflight_runner(
    settings: &StageSettings,
    runner: &Arc<dyn CommandRunner>,
    hooks: Option<Arc<HookRunner>>,
) -> PreflightRunner {
    let mut preflight = PreflightRunner::default();

    if let Some(hooks) = hooks {
        preflight.push(Box::new(PreDeployHookCheck::new(
            hooks,
            settings.project.clone(),
        )));
    }
    if !settings.allow_dirty {
        preflight.push(Box::new(GitStatusCheck::new(runner.clone())));
    }
    preflight.push(Box::new(CredentialsCheck::new(runner.clone(), None)));
    if let Some(ref tests) = settings.tests {
        preflight.push(Box::new(TestSuiteCheck::new(
            runner.clone(),
            CommandSpec::shell(tests),
        )));
    }
    preflight.push(Box::new(CertificateCheck::new(runner.clone(), None)));

    for check in &settings.preflight {
        preflight.push(Box::new(
            CommandCheck::new(check.name.clone(), runner.clone(), CommandSpec::shell(&check.run))
                .expecting(check.expect.clone()),
        ));
    }

    preflight
}

/// Postflight checks; the runner orders advisory before critical.
pub fn postflight_runner(
    settings: &StageSettings,
    runner: &Arc<dyn CommandRunner>,
) -> PostflightRunner {
    let mut postflight = PostflightRunner::default();

    if let Some(ref health) = settings.health {
        postflight.push(Box::new(
            HealthCheck::new(runner.clone(), health.url.clone())
                .with_retries(health.attempts, health.interval),
        ));
    }
    if let Some(ref origin) = settings.origin_url {
        postflight.push(Box::new(OriginSecurityCheck::new(runner.clone(), origin.clone())));
    }
    if let Some(ref database) = settings.database {
        postflight.push(Box::new(
            CommandCheck::new("database", runner.clone(), CommandSpec::shell(database))
                .with_severity(Severity::Advisory),
        ));
    }
    postflight.push(Box::new(DomainConfigCheck::new(
        runner.clone(),
        settings.cache.distribution_id.clone(),
    )));

    for check in &settings.postflight {
        let severity = if check.critical {
            Severity::Critical
        } else {
            Severity::Advisory
        };
        postflight.push(Box::new(
            CommandCheck::new(check.name.clone(), runner.clone(), CommandSpec::shell(&check.run))
                .expecting(check.expect.clone())
                .with_severity(severity),
        ));
    }

    postflight
}

/// Build a fully wired orchestrator for one stage.
pub fn orchestrator(
    settings: &StageSettings,
    project_root: &Path,
    runner: Arc<dyn CommandRunner>,
    locks: Arc<LockManager>,
) -> Result<DeploymentOrchestrator> {
    let hooks = Arc::new(HookRunner::new(project_root, runner.clone()));
    let env = resolve_env_map(&settings.env)?;

    let deploy_command = match settings.deploy_script {
        Some(ref script) => DeployCommand::Script(script.clone()),
        None => DeployCommand::Tool(infra_tool(settings)?),
    };

    let cache: Option<Box<dyn CacheInvalidator>> = settings.cache.target().map(|id| {
        Box::new(
            CloudFrontInvalidator::new(runner.clone(), id).with_paths(settings.cache.paths.clone()),
        ) as Box<dyn CacheInvalidator>
    });

    let backup: Option<Box<dyn BackupInvoker>> = settings.backup.as_ref().map(|line| {
        Box::new(CommandBackup::new(runner.clone(), CommandSpec::shell(line)))
            as Box<dyn BackupInvoker>
    });

    Ok(
        DeploymentOrchestrator::new(
            locks,
            Box::new(CommandDeploy::new(runner.clone(), deploy_command)),
            project_root,
        )
        .with_project_name(settings.project.clone())
        .with_preflight(preflight_runner(settings, &runner, Some(hooks.clone())))
        .with_postflight(postflight_runner(settings, &runner))
        .with_build(Box::new(CommandBuild::new(
            runner.clone(),
            settings.build.as_deref().map(CommandSpec::shell),
        )))
        .with_cache_invalidator(cache)
        .with_backup(backup)
        .with_hooks(hooks)
        .with_domain(settings.domain.clone())
        .with_profile(settings.profile.clone())
        .with_env(env),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::process::ProcessRunner;

    const YAML: &str = r#"
project: acme-web
tests: npm test
preflight:
  - name: lint
    run: npm run lint
stages:
  - name: staging
    allow_dirty: true
    skip_tests: true
    health:
      url: https://staging.example.com/health
  - name: production
    domain: example.com
    database: ./scripts/db-ping
    postflight:
      - name: smoke
        run: ./scripts/smoke
        critical: true
"#;

    fn runner() -> Arc<dyn CommandRunner> {
        Arc::new(ProcessRunner)
    }

    #[test]
    fn preflight_respects_stage_flags() {
        let config = Config::from_yaml(YAML).unwrap();
        let staging = config.for_stage("staging").unwrap();
        let production = config.for_stage("production").unwrap();

        assert_eq!(
            preflight_runner(&staging, &runner(), None).check_names(),
            vec!["credentials", "certificate", "lint"]
        );
        assert_eq!(
            preflight_runner(&production, &runner(), None).check_names(),
            vec!["git-status", "credentials", "tests", "certificate", "lint"]
        );
    }

    #[test]
    fn postflight_includes_configured_probes() {
        let config = Config::from_yaml(YAML).unwrap();
        let staging = config.for_stage("staging").unwrap();
        let production = config.for_stage("production").unwrap();

        assert_eq!(
            postflight_runner(&staging, &runner()).check_names(),
            vec!["health", "domain-config"]
        );
        assert_eq!(
            postflight_runner(&production, &runner()).check_names(),
            vec!["database", "domain-config", "smoke"]
        );
    }

    #[test]
    fn blank_infra_tool_is_rejected() {
        let config = Config::from_yaml(YAML).unwrap();
        let mut settings = config.for_stage("staging").unwrap();
        settings.infra_tool = "  ".to_string();
        assert!(matches!(infra_tool(&settings), Err(Error::InvalidConfig(_))));
    }
}
