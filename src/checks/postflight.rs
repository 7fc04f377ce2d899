// ABOUTME: Built-in postflight checks: application health, origin security, domain configuration.
// ABOUTME: HTTP probes shell out to curl; domain configuration is the only critical check.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::process::{CommandRunner, CommandSpec};

use super::{Check, CheckContext, CheckOutcome, Severity};

const PROBE_MAX_TIME_SECS: &str = "10";

/// Fetch a URL and return the HTTP status code (0 when unreachable).
async fn http_status(runner: &dyn CommandRunner, url: &str) -> Result<u16, String> {
    let command = CommandSpec::new("curl").args([
        "-s",
        "-o",
        "/dev/null",
        "-w",
        "%{http_code}",
        "--max-time",
        PROBE_MAX_TIME_SECS,
        url,
    ]);
    let output = runner.run(&command).await.map_err(|e| e.to_string())?;
    output
        .stdout
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("unexpected probe output for {url}: {}", output.failure_summary()))
}

/// Polls the application health endpoint with bounded retries.
///
/// Requests go through `curl`. If it is not installed every attempt fails to
/// spawn, which surfaces as an advisory failure.
pub struct HealthCheck {
    runner: Arc<dyn CommandRunner>,
    url: String,
    attempts: u32,
    interval: Duration,
}

impl HealthCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, url: impl Into<String>) -> Self {
        Self {
            runner,
            url: url.into(),
            attempts: 1,
            interval: Duration::ZERO,
        }
    }

    pub fn with_retries(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.interval = interval;
        self
    }

    async fn probe(&self) -> CheckOutcome {
        match http_status(self.runner.as_ref(), &self.url).await {
            Ok(code) if (200..300).contains(&code) => CheckOutcome::Passed,
            Ok(0) => CheckOutcome::Failed(format!("{} is unreachable", self.url)),
            Ok(code) => CheckOutcome::Failed(format!("{} returned HTTP {}", self.url, code)),
            Err(e) => CheckOutcome::Failed(e),
        }
    }
}

#[async_trait]
impl Check for HealthCheck {
    fn name(&self) -> &str {
        "health"
    }

    fn severity(&self) -> Severity {
        Severity::Advisory
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckOutcome {
        let mut outcome = self.probe().await;
        for _ in 1..self.attempts {
            if !outcome.is_failure() {
                break;
            }
            tokio::time::sleep(self.interval).await;
            outcome = self.probe().await;
        }
        outcome
    }
}

/// Verifies the origin cannot be reached directly, bypassing the CDN.
pub struct OriginSecurityCheck {
    runner: Arc<dyn CommandRunner>,
    origin_url: String,
}

impl OriginSecurityCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, origin_url: impl Into<String>) -> Self {
        Self {
            runner,
            origin_url: origin_url.into(),
        }
    }
}

#[async_trait]
impl Check for OriginSecurityCheck {
    fn name(&self) -> &str {
        "origin-security"
    }

    fn severity(&self) -> Severity {
        Severity::Advisory
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckOutcome {
        match http_status(self.runner.as_ref(), &self.origin_url).await {
            Ok(0 | 401 | 403) => CheckOutcome::Passed,
            Ok(code) if code >= 500 => CheckOutcome::Passed,
            Ok(code) => CheckOutcome::Failed(format!(
                "origin {} is directly reachable (HTTP {}); requests can bypass the CDN",
                self.origin_url, code
            )),
            Err(e) => CheckOutcome::Failed(e),
        }
    }
}

/// Validates the stage domain end to end: DNS records, the CDN certificate
/// alias, and that the domain reaches a running application.
///
/// Lookups shell out to `dig`, `aws` and `curl`. This check is critical, so a
/// host without `dig` fails the deployment at the DNS step.
pub struct DomainConfigCheck {
    runner: Arc<dyn CommandRunner>,
    distribution_id: Option<String>,
}

impl DomainConfigCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, distribution_id: Option<String>) -> Self {
        Self {
            runner,
            distribution_id,
        }
    }

    async fn check_dns(&self, domain: &str) -> Result<(), String> {
        let command = CommandSpec::new("dig").args(["+short", domain]);
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(format!("DNS lookup failed: {}", output.failure_summary()));
        }
        if output.stdout.trim().is_empty() {
            return Err(format!("no DNS records found for {domain}"));
        }
        Ok(())
    }

    async fn check_alias(&self, domain: &str, profile: Option<&str>) -> Result<(), String> {
        let Some(ref id) = self.distribution_id else {
            return Ok(());
        };
        let command = CommandSpec::new("aws")
            .args([
                "cloudfront",
                "get-distribution-config",
                "--id",
                id.as_str(),
                "--query",
                "DistributionConfig.Aliases.Items",
                "--output",
                "text",
            ])
            .profile(profile);
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(format!(
                "could not read distribution {id}: {}",
                output.failure_summary()
            ));
        }
        let domain_lower = domain.to_lowercase();
        if output
            .stdout
            .split_whitespace()
            .any(|alias| alias.to_lowercase() == domain_lower)
        {
            Ok(())
        } else {
            Err(format!("distribution {id} has no alias for {domain}"))
        }
    }

    async fn check_wiring(&self, domain: &str) -> Result<(), String> {
        let url = format!("https://{domain}/");
        match http_status(self.runner.as_ref(), &url).await? {
            0 => Err(format!("{url} is unreachable")),
            code if code >= 500 => Err(format!("{url} returned HTTP {code}")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Check for DomainConfigCheck {
    fn name(&self) -> &str {
        "domain-config"
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome {
        let Some(domain) = ctx.domain.as_deref() else {
            return CheckOutcome::Skipped("no domain configured for stage".to_string());
        };

        if let Err(e) = self.check_dns(domain).await {
            return CheckOutcome::Failed(format!("DNS records: {e}"));
        }
        if let Err(e) = self.check_alias(domain, ctx.profile.as_deref()).await {
            return CheckOutcome::Failed(format!("certificate alias: {e}"));
        }
        if let Err(e) = self.check_wiring(domain).await {
            return CheckOutcome::Failed(format!("runtime wiring: {e}"));
        }
        CheckOutcome::Passed
    }
}
