// ABOUTME: Local deployment lock record and its time-to-live.
// ABOUTME: Records are JSON files keyed by stage; staleness is purely TTL based.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Stage;

use super::LockError;

/// Default lock lifetime.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(120 * 60);

/// A strictly positive lock lifetime, so `expires_at > created_at` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTtl(TimeDelta);

impl LockTtl {
    pub fn new(ttl: Duration) -> Result<Self, LockError> {
        if ttl.is_zero() {
            return Err(LockError::InvalidTtl("lock TTL must be greater than zero".to_string()));
        }
        TimeDelta::from_std(ttl)
            .map(Self)
            .map_err(|_| LockError::InvalidTtl(format!("lock TTL {ttl:?} is out of range")))
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }

    pub fn minutes(&self) -> i64 {
        self.0.num_minutes()
    }
}

impl Default for LockTtl {
    fn default() -> Self {
        Self(TimeDelta::minutes(120))
    }
}

/// Local lock marker for one stage.
///
/// Created fresh on every acquire and never mutated afterwards. `holder` and
/// `pid` are informational and optional so older records still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentLock {
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl DeploymentLock {
    /// Create a lock for the current process starting now.
    pub fn new(stage: &Stage, reason: impl Into<String>, ttl: LockTtl) -> Self {
        Self::starting_at(stage, reason, ttl, Utc::now())
    }

    pub fn starting_at(
        stage: &Stage,
        reason: impl Into<String>,
        ttl: LockTtl,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage: stage.clone(),
            created_at,
            expires_at: created_at + ttl.as_delta(),
            reason: reason.into(),
            holder: Some(gethostname::gethostname().to_string_lossy().into_owned()),
            pid: Some(std::process::id()),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whole minutes until expiry, rounded up so a live lock never reports 0.
    pub fn remaining_minutes_at(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.expires_at - now).num_seconds();
        if secs <= 0 { 0 } else { (secs + 59) / 60 }
    }

    pub fn remaining_minutes(&self) -> i64 {
        self.remaining_minutes_at(Utc::now())
    }

    /// Whole minutes since expiry; 0 while the lock is still live.
    pub fn expired_minutes_ago_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.expires_at).num_minutes().max(0)
    }

    /// Short description of who holds the lock, for messages.
    pub fn holder_description(&self) -> String {
        match (&self.holder, self.pid) {
            (Some(host), Some(pid)) => format!("{host} (pid {pid})"),
            (Some(host), None) => host.clone(),
            (None, Some(pid)) => format!("pid {pid}"),
            (None, None) => "unknown holder".to_string(),
        }
    }
}
