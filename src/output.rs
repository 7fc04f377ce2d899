// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::DeploymentResult;
use crate::rollback::{FileLockState, Guidance, LockStatus, RecoveryReport};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON documents for scripting
    Json,
}

impl OutputMode {
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a warning (suppressed in json mode, where warnings ride in the document).
    pub fn warning(&self, message: &str) {
        if self.mode != OutputMode::Json {
            eprintln!("Warning: {message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => self.event("success", message),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.start_time.map(|_| self.elapsed_secs()),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    fn event(&self, event: &str, message: &str) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            println!("{json}");
        }
    }

    /// Print a serializable document as pretty JSON.
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: failed to serialize output: {e}"),
        }
    }

    pub fn deployment(&self, result: &DeploymentResult) {
        if self.mode == OutputMode::Json {
            self.json(result);
            return;
        }

        if self.mode == OutputMode::Normal {
            for timing in &result.timings {
                println!(
                    "  {:<18} {:>7.1}s",
                    timing.name.name(),
                    timing.duration.as_secs_f64()
                );
            }
            for check in result.checks.iter().filter(|c| !c.passed) {
                println!(
                    "  ✗ {}: {}",
                    check.name,
                    check.error.as_deref().unwrap_or("failed")
                );
            }
        }

        for warning in &result.warnings {
            self.warning(warning);
        }

        if result.success {
            println!("{} ({:.1}s)", result.message, result.duration_seconds);
        } else {
            eprintln!("Error: {}", result.message);
            if let Some(ref error) = result.error {
                eprintln!("  {error}");
            }
        }
    }

    pub fn guidance(&self, guidance: &[Guidance]) {
        if self.mode == OutputMode::Json {
            self.json(&guidance);
            return;
        }
        for item in guidance {
            println!("{item}");
        }
    }

    pub fn status(&self, status: &LockStatus) {
        if self.mode == OutputMode::Json {
            self.json(status);
            return;
        }

        println!("Stage: {}", status.stage);
        println!(
            "Remote lock: {}",
            if status.remote_locked { "held" } else { "not held" }
        );
        match (&status.state, &status.file_lock) {
            (FileLockState::Active { remaining_minutes }, Some(lock)) => println!(
                "File lock: active, held by {} ({}), expires in {} min",
                lock.holder_description(),
                lock.reason,
                remaining_minutes
            ),
            (FileLockState::Stale { expired_minutes_ago }, _) => println!(
                "File lock: stale, expired {} min ago (next deploy reclaims it)",
                expired_minutes_ago
            ),
            _ => println!("File lock: none"),
        }
    }

    pub fn recovery(&self, report: &RecoveryReport) {
        if self.mode == OutputMode::Json {
            self.json(report);
            return;
        }
        if let Some(ref lock) = report.released {
            self.progress(&format!(
                "Released file lock held by {} since {}",
                lock.holder_description(),
                lock.created_at
            ));
        }
        self.success(&format!("Recovered {}; both lock layers are clear", report.stage));
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
