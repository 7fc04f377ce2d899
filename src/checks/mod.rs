// ABOUTME: Named validation steps run before and after the deploy action.
// ABOUTME: Defines the Check trait, the shared CheckContext, and per-check results.

mod command;
mod postflight;
mod preflight;
mod runner;

pub use command::CommandCheck;
pub use postflight::{DomainConfigCheck, HealthCheck, OriginSecurityCheck};
pub use preflight::{CertificateCheck, CredentialsCheck, GitStatusCheck, TestSuiteCheck};
pub use runner::{CheckFailure, PostflightReport, PostflightRunner, PreflightReport, PreflightRunner};

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::Stage;

/// Whether a failing check aborts its phase.
///
/// Preflight treats every check as critical; the distinction matters in postflight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Critical,
    Advisory,
}

/// Facts established by a passing check, so later checks need not re-verify them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verification {
    WorkingTree,
    Credentials,
    Tests,
    Certificate,
}

/// State threaded through one pipeline's checks.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub stage: Stage,
    pub project_root: PathBuf,
    pub domain: Option<String>,
    pub profile: Option<String>,
    verified: BTreeSet<Verification>,
}

impl CheckContext {
    pub fn new(stage: Stage, project_root: &Path) -> Self {
        Self {
            stage,
            project_root: project_root.to_path_buf(),
            domain: None,
            profile: None,
            verified: BTreeSet::new(),
        }
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    pub fn mark_verified(&mut self, verification: Verification) {
        self.verified.insert(verification);
    }

    pub fn is_verified(&self, verification: Verification) -> bool {
        self.verified.contains(&verification)
    }
}

/// What a single check run concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Skipped(String),
    Failed(String),
}

impl CheckOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckOutcome::Failed(_))
    }
}

/// A named validation step.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    /// Fact recorded in the context when this check passes. A check whose
    /// fact is already verified is skipped.
    fn provides(&self) -> Option<Verification> {
        None
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome;
}

/// Recorded result of one check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub skipped: bool,
    #[serde(rename = "durationSeconds", serialize_with = "serialize_secs")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub(crate) fn from_outcome(name: &str, outcome: &CheckOutcome, duration: Duration) -> Self {
        let (passed, skipped, error) = match outcome {
            CheckOutcome::Passed => (true, false, None),
            CheckOutcome::Skipped(_) => (true, true, None),
            CheckOutcome::Failed(msg) => (false, false, Some(msg.clone())),
        };
        Self {
            name: name.to_string(),
            passed,
            skipped,
            duration,
            error,
        }
    }
}

/// Serialize a duration as fractional seconds.
pub(crate) fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
