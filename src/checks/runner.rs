// ABOUTME: Ordered check runners for the preflight and postflight phases.
// ABOUTME: Preflight is fail-fast; postflight runs advisory checks concurrently.

use futures::future::join_all;
use std::time::Instant;

use super::{Check, CheckContext, CheckOutcome, CheckResult, Severity};

/// The first failing check of a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub check: String,
    pub message: String,
}

async fn run_one(check: &dyn Check, ctx: &CheckContext) -> (CheckResult, CheckOutcome) {
    if let Some(fact) = check.provides()
        && ctx.is_verified(fact)
    {
        let outcome = CheckOutcome::Skipped(format!("{fact:?} already verified"));
        tracing::debug!("Skipping check {}: already verified", check.name());
        return (
            CheckResult::from_outcome(check.name(), &outcome, Default::default()),
            outcome,
        );
    }

    let started = Instant::now();
    let outcome = check.run(ctx).await;
    let result = CheckResult::from_outcome(check.name(), &outcome, started.elapsed());

    match &outcome {
        CheckOutcome::Passed => tracing::info!("Check {} passed", check.name()),
        CheckOutcome::Skipped(why) => tracing::info!("Check {} skipped: {}", check.name(), why),
        CheckOutcome::Failed(why) => tracing::warn!("Check {} failed: {}", check.name(), why),
    }

    (result, outcome)
}

fn record_pass(check: &dyn Check, outcome: &CheckOutcome, ctx: &mut CheckContext) {
    if *outcome == CheckOutcome::Passed
        && let Some(fact) = check.provides()
    {
        ctx.mark_verified(fact);
    }
}

/// Outcome of the preflight phase.
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub results: Vec<CheckResult>,
    pub failure: Option<CheckFailure>,
}

impl PreflightReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs checks in registration order, stopping at the first failure.
#[derive(Default)]
pub struct PreflightRunner {
    checks: Vec<Box<dyn Check>>,
}

impl PreflightRunner {
    pub fn new(checks: Vec<Box<dyn Check>>) -> Self {
        Self { checks }
    }

    pub fn push(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub async fn run(&self, ctx: &mut CheckContext) -> PreflightReport {
        let mut report = PreflightReport::default();

        for check in &self.checks {
            let (result, outcome) = run_one(check.as_ref(), ctx).await;
            report.results.push(result);

            if let CheckOutcome::Failed(message) = outcome {
                report.failure = Some(CheckFailure {
                    check: check.name().to_string(),
                    message,
                });
                break;
            }
            record_pass(check.as_ref(), &outcome, ctx);
        }

        report
    }
}

/// Outcome of the postflight phase.
#[derive(Debug, Default)]
pub struct PostflightReport {
    pub results: Vec<CheckResult>,
    pub advisory_failures: Vec<CheckFailure>,
    pub critical_failure: Option<CheckFailure>,
}

impl PostflightReport {
    pub fn passed(&self) -> bool {
        self.critical_failure.is_none()
    }
}

/// Runs advisory checks concurrently, then critical checks in order.
///
/// Advisory failures are reported but never fail the phase. The first
/// critical failure stops the remaining critical checks.
#[derive(Default)]
pub struct PostflightRunner {
    checks: Vec<Box<dyn Check>>,
}

impl PostflightRunner {
    pub fn new(checks: Vec<Box<dyn Check>>) -> Self {
        Self { checks }
    }

    pub fn push(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub async fn run(&self, ctx: &mut CheckContext) -> PostflightReport {
        let mut report = PostflightReport::default();

        let (advisory, critical): (Vec<&dyn Check>, Vec<&dyn Check>) = self
            .checks
            .iter()
            .map(|c| c.as_ref())
            .partition(|c| c.severity() == Severity::Advisory);

        let shared: &CheckContext = ctx;
        let advisory_runs = join_all(advisory.iter().map(|&c| run_one(c, shared))).await;

        let mut passed_advisory = Vec::new();
        for (&check, (result, outcome)) in advisory.iter().zip(advisory_runs) {
            report.results.push(result);
            match outcome {
                CheckOutcome::Failed(message) => report.advisory_failures.push(CheckFailure {
                    check: check.name().to_string(),
                    message,
                }),
                other => passed_advisory.push((check, other)),
            }
        }
        for (check, outcome) in passed_advisory {
            record_pass(check, &outcome, ctx);
        }

        for check in critical {
            let (result, outcome) = run_one(check, ctx).await;
            report.results.push(result);

            if let CheckOutcome::Failed(message) = outcome {
                report.critical_failure = Some(CheckFailure {
                    check: check.name().to_string(),
                    message,
                });
                break;
            }
            record_pass(check, &outcome, ctx);
        }

        report
    }
}
