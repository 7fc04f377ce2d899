// ABOUTME: Structured outcome of one deployment run with per-phase timing.
// ABOUTME: Always returned by the orchestrator, on success and failure alike.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::checks::{CheckResult, serialize_secs};
use crate::types::Stage;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LockCheck,
    Precheck,
    Backup,
    Build,
    Deploy,
    Postcheck,
    CacheInvalidate,
    Release,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::LockCheck => "lock_check",
            Phase::Precheck => "precheck",
            Phase::Backup => "backup",
            Phase::Build => "build",
            Phase::Deploy => "deploy",
            Phase::Postcheck => "postcheck",
            Phase::CacheInvalidate => "cache_invalidate",
            Phase::Release => "release",
        }
    }
}

/// Wall-clock duration of one phase.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub name: Phase,
    #[serde(rename = "durationSeconds", serialize_with = "serialize_secs")]
    pub duration: Duration,
}

/// Per-phase success flags.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetails {
    pub git_status_ok: bool,
    pub builds_ok: bool,
    pub tests_ok: bool,
    pub deployment_ok: bool,
    pub health_checks_ok: bool,
    /// None when invalidation was skipped for the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_invalidated_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

/// Result of one `deploy(stage)` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub success: bool,
    pub stage: Stage,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: DeploymentDetails,
    pub timings: Vec<StageTiming>,
    pub checks: Vec<CheckResult>,
    pub warnings: Vec<String>,
    /// True when a failed run left the stage lock held.
    pub lock_retained: bool,
}

impl DeploymentResult {
    pub(crate) fn started(stage: &Stage) -> Self {
        let now = Utc::now();
        Self {
            success: false,
            stage: stage.clone(),
            start_time: now,
            end_time: now,
            duration_seconds: 0.0,
            message: String::new(),
            error: None,
            details: DeploymentDetails::default(),
            timings: Vec::new(),
            checks: Vec::new(),
            warnings: Vec::new(),
            lock_retained: false,
        }
    }

    pub(crate) fn record(&mut self, phase: Phase, started: Instant) {
        self.timings.push(StageTiming {
            name: phase,
            duration: started.elapsed(),
        });
    }

    pub(crate) fn finish(&mut self, started: Instant) {
        self.end_time = Utc::now();
        self.duration_seconds = started.elapsed().as_secs_f64();
    }

    /// Duration of a recorded phase, if it ran.
    pub fn timing(&self, phase: Phase) -> Option<Duration> {
        self.timings
            .iter()
            .find(|t| t.name == phase)
            .map(|t| t.duration)
    }

    /// The last phase that ran, i.e. the failing phase of a failed run.
    pub fn last_phase(&self) -> Option<Phase> {
        self.timings.last().map(|t| t.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_details_in_camel_case() {
        let mut result = DeploymentResult::started(&Stage::new("staging").unwrap());
        result.details.git_status_ok = true;
        result.details.cache_invalidated_ok = Some(false);
        result.record(Phase::Precheck, Instant::now());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["details"]["gitStatusOk"], true);
        assert_eq!(json["details"]["cacheInvalidatedOk"], false);
        assert!(json["details"].get("backupPath").is_none());
        assert_eq!(json["timings"][0]["name"], "precheck");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn timing_lookup_and_last_phase() {
        let mut result = DeploymentResult::started(&Stage::new("staging").unwrap());
        assert!(result.last_phase().is_none());

        result.record(Phase::LockCheck, Instant::now());
        result.record(Phase::Precheck, Instant::now());

        assert!(result.timing(Phase::LockCheck).is_some());
        assert!(result.timing(Phase::Deploy).is_none());
        assert_eq!(result.last_phase(), Some(Phase::Precheck));
    }
}
