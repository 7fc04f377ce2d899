// ABOUTME: Generic check backed by an external command.
// ABOUTME: Passes on exit 0 and, optionally, when stdout contains an expected string.

use async_trait::async_trait;
use std::sync::Arc;

use crate::process::{CommandRunner, CommandSpec};

use super::{Check, CheckContext, CheckOutcome, Severity};

/// A named command whose success is the check result.
pub struct CommandCheck {
    name: String,
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
    expect: Option<String>,
    severity: Severity,
}

impl CommandCheck {
    pub fn new(name: impl Into<String>, runner: Arc<dyn CommandRunner>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            runner,
            command,
            expect: None,
            severity: Severity::Critical,
        }
    }

    /// Require stdout to contain this text.
    pub fn expecting(mut self, text: Option<String>) -> Self {
        self.expect = text;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

#[async_trait]
impl Check for CommandCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    async fn run(&self, ctx: &CheckContext) -> CheckOutcome {
        let command = self
            .command
            .clone()
            .current_dir(&ctx.project_root)
            .env("STAGEHAND_STAGE", ctx.stage.as_str())
            .profile(ctx.profile.as_deref());

        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(e) => return CheckOutcome::Failed(e.to_string()),
        };

        if !output.success() {
            return CheckOutcome::Failed(output.failure_summary());
        }

        match &self.expect {
            Some(expected) if !output.stdout.contains(expected.as_str()) => {
                CheckOutcome::Failed(format!("output did not contain '{expected}'"))
            }
            _ => CheckOutcome::Passed,
        }
    }
}
