// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

/// Collects non-fatal warnings during deployment operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.message.clone()).collect()
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A postflight check that failed without failing the deploy.
    pub fn advisory_check(check: &str, message: &str) -> Self {
        Self {
            kind: WarningKind::AdvisoryCheck,
            message: format!("postflight check '{check}' failed: {message}"),
        }
    }

    pub fn cache_invalidation(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CacheInvalidation,
            message: message.into(),
        }
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Hook,
            message: message.into(),
        }
    }

    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Advisory postflight check failed, presumed propagation delay.
    AdvisoryCheck,
    /// CDN cache could not be invalidated; content may be stale.
    CacheInvalidation,
    /// Post-deploy or on-error hook failed.
    Hook,
    /// Failed to release deploy lock (lock file may remain).
    LockRelease,
}
