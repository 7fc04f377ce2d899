// ABOUTME: Built-in preflight checks: working tree, credentials, tests, certificate.
// ABOUTME: Each runs before any infrastructure mutation and aborts the deploy on failure.

use async_trait::async_trait;
use std::sync::Arc;

use crate::process::{CommandRunner, CommandSpec};

use super::{Check, CheckContext, CheckOutcome, Verification};

/// Fails when the working tree has uncommitted changes.
pub struct GitStatusCheck {
    runner: Arc<dyn CommandRunner>,
}

impl GitStatusCheck {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Check for GitStatusCheck {
    fn name(&self) -> &str {
        "git-status"
    }

    fn provides(&self) -> Option<Verification> {
        Some(Verification::WorkingTree)
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome {
        let command = CommandSpec::new("git")
            .args(["status", "--porcelain"])
            .current_dir(&ctx.project_root);

        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(e) => return CheckOutcome::Failed(e.to_string()),
        };

        if !output.success() {
            return CheckOutcome::Failed(format!(
                "git status failed: {}",
                output.failure_summary()
            ));
        }

        let changed: Vec<&str> = output
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();

        if changed.is_empty() {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed(format!(
                "working tree has {} uncommitted change(s); commit or stash before deploying",
                changed.len()
            ))
        }
    }
}

/// Verifies cloud credentials for the stage's profile are valid.
pub struct CredentialsCheck {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
}

impl CredentialsCheck {
    /// Uses `aws sts get-caller-identity` unless a command is given.
    pub fn new(runner: Arc<dyn CommandRunner>, command: Option<CommandSpec>) -> Self {
        let command = command
            .unwrap_or_else(|| CommandSpec::new("aws").args(["sts", "get-caller-identity"]));
        Self { runner, command }
    }
}

#[async_trait]
impl Check for CredentialsCheck {
    fn name(&self) -> &str {
        "credentials"
    }

    fn provides(&self) -> Option<Verification> {
        Some(Verification::Credentials)
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome {
        let command = self.command.clone().profile(ctx.profile.as_deref());
        match self.runner.run(&command).await {
            Ok(output) if output.success() => CheckOutcome::Passed,
            Ok(output) => {
                let profile = ctx.profile.as_deref().unwrap_or("default");
                CheckOutcome::Failed(format!(
                    "credentials for profile '{}' are invalid or expired: {}",
                    profile,
                    output.failure_summary()
                ))
            }
            Err(e) => CheckOutcome::Failed(e.to_string()),
        }
    }
}

/// Runs the project's test suite.
pub struct TestSuiteCheck {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
}

impl TestSuiteCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, command: CommandSpec) -> Self {
        Self { runner, command }
    }
}

#[async_trait]
impl Check for TestSuiteCheck {
    fn name(&self) -> &str {
        "tests"
    }

    fn provides(&self) -> Option<Verification> {
        Some(Verification::Tests)
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome {
        let command = self
            .command
            .clone()
            .current_dir(&ctx.project_root)
            .env("STAGEHAND_STAGE", ctx.stage.as_str());
        match self.runner.run(&command).await {
            Ok(output) if output.success() => CheckOutcome::Passed,
            Ok(output) => CheckOutcome::Failed(format!("tests failed: {}", output.failure_summary())),
            Err(e) => CheckOutcome::Failed(e.to_string()),
        }
    }
}

/// Verifies an issued certificate covers the stage domain.
pub struct CertificateCheck {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
}

impl CertificateCheck {
    /// Lists issued ACM certificates in us-east-1 (where CloudFront reads them)
    /// unless a command is given. The command must print covered domain names.
    pub fn new(runner: Arc<dyn CommandRunner>, command: Option<CommandSpec>) -> Self {
        let command = command.unwrap_or_else(|| {
            CommandSpec::new("aws").args([
                "acm",
                "list-certificates",
                "--region",
                "us-east-1",
                "--certificate-statuses",
                "ISSUED",
                "--query",
                "CertificateSummaryList[].DomainName",
                "--output",
                "text",
            ])
        });
        Self { runner, command }
    }
}

/// Whether a certificate name (possibly a wildcard) covers a domain.
pub(crate) fn certificate_covers(cert_name: &str, domain: &str) -> bool {
    let cert_name = cert_name.trim().to_lowercase();
    let domain = domain.trim().to_lowercase();
    if cert_name == domain {
        return true;
    }
    match (cert_name.strip_prefix("*."), domain.split_once('.')) {
        (Some(parent), Some((_, domain_parent))) => parent == domain_parent,
        _ => false,
    }
}

#[async_trait]
impl Check for CertificateCheck {
    fn name(&self) -> &str {
        "certificate"
    }

    fn provides(&self) -> Option<Verification> {
        Some(Verification::Certificate)
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome {
        let Some(domain) = ctx.domain.as_deref() else {
            return CheckOutcome::Skipped("no domain configured for stage".to_string());
        };

        let command = self.command.clone().profile(ctx.profile.as_deref());
        let output = match self.runner.run(&command).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                return CheckOutcome::Failed(format!(
                    "could not list certificates: {}",
                    output.failure_summary()
                ));
            }
            Err(e) => return CheckOutcome::Failed(e.to_string()),
        };

        if output
            .stdout
            .split_whitespace()
            .any(|name| certificate_covers(name, domain))
        {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed(format!("no issued certificate covers {domain}"))
        }
    }
}
