// ABOUTME: Per-stage deployment lock manager over a local marker file and the remote backend lock.
// ABOUTME: File locks are created via hard link and reclaimed under an flock guard.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use nix::fcntl::{Flock, FlockArg};
use tokio::fs;

use crate::types::Stage;

use super::{DeploymentLock, LockBackend, LockError, LockTtl, RemoteLockState};

/// Lock files live under `<project>/.stagehand/locks/`.
pub const LOCK_DIR: &str = ".stagehand/locks";

/// Default bound on a single remote lock probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Serializes deployments per stage.
///
/// The local file defends against concurrent runs on the same machine; the
/// remote backend lock defends the infrastructure state itself.
pub struct LockManager {
    lock_dir: PathBuf,
    ttl: LockTtl,
    probe_timeout: Duration,
    backend: Arc<dyn LockBackend>,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("lock_dir", &self.lock_dir)
            .field("ttl", &self.ttl)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl LockManager {
    pub fn new(project_root: &Path, backend: Arc<dyn LockBackend>) -> Self {
        Self {
            lock_dir: project_root.join(LOCK_DIR),
            ttl: LockTtl::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            backend,
        }
    }

    pub fn with_ttl(mut self, ttl: LockTtl) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> LockTtl {
        self.ttl
    }

    /// Path to the lock file for a stage.
    pub fn lock_path(&self, stage: &Stage) -> PathBuf {
        self.lock_dir.join(format!("{stage}.lock"))
    }

    /// Acquire the local lock for a stage.
    ///
    /// Succeeds when no record exists, or when the existing record is expired
    /// or unreadable. Returns `LockError::Held` while an unexpired lock exists.
    pub async fn acquire(&self, stage: &Stage, reason: &str) -> Result<DeploymentLock, LockError> {
        fs::create_dir_all(&self.lock_dir)
            .await
            .map_err(|e| LockError::io(&self.lock_dir, e))?;

        let path = self.lock_path(stage);
        let lock = DeploymentLock::new(stage, reason, self.ttl);
        let body = serde_json::to_vec_pretty(&lock)?;

        if self.try_create(&path, &body).await? {
            tracing::debug!("Acquired deploy lock for {} at {}", stage, path.display());
            return Ok(lock);
        }

        match read_record(&path).await {
            Some(existing) if !existing.is_expired() => return Err(held(stage, &existing)),
            _ => {}
        }

        // Reclaiming is serialized; the record is judged again under the guard.
        let _guard = self.reclaim_guard(stage).await?;

        match read_record(&path).await {
            Some(existing) if !existing.is_expired() => return Err(held(stage, &existing)),
            Some(existing) => tracing::warn!(
                "Reclaiming stale lock for {} held by {} (expired {})",
                stage,
                existing.holder_description(),
                existing.expires_at
            ),
            None if fs::try_exists(&path).await.unwrap_or(true) => {
                tracing::warn!("Lock file for {} unreadable, reclaiming it", stage)
            }
            None => {}
        }

        self.set_aside(stage, &path).await?;

        if self.try_create(&path, &body).await? {
            tracing::debug!("Acquired deploy lock for {} after reclaiming", stage);
            return Ok(lock);
        }

        match read_record(&path).await {
            Some(existing) if !existing.is_expired() => Err(held(stage, &existing)),
            _ => Err(LockError::Contended(stage.clone())),
        }
    }

    /// Take the per-stage reclaim guard, blocking until it is free.
    ///
    /// The guard file is never removed; an `flock` on it is dropped by the
    /// kernel if the holder dies.
    async fn reclaim_guard(&self, stage: &Stage) -> Result<Flock<std::fs::File>, LockError> {
        let guard_path = self.lock_dir.join(format!("{stage}.guard"));
        let open_path = guard_path.clone();

        let locked = tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&open_path)?;
            Flock::lock(file, FlockArg::LockExclusive)
                .map_err(|(_, errno)| std::io::Error::from(errno))
        })
        .await
        .map_err(|e| LockError::io(&guard_path, std::io::Error::other(e)))?;

        locked.map_err(|e| LockError::io(&guard_path, e))
    }

    /// Move a stale or corrupt record out of the way.
    ///
    /// The file is renamed to a unique tombstone and judged again there. A
    /// record that turns out to be live is linked back into place.
    async fn set_aside(&self, stage: &Stage, path: &Path) -> Result<(), LockError> {
        let tombstone = path.with_extension(format!(
            "lock.{}.{}.stale",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        match fs::rename(path, &tombstone).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(LockError::io(path, e)),
        }

        match read_record(&tombstone).await {
            Some(moved) if !moved.is_expired() => {
                tracing::warn!("Lock for {} was replaced while reclaiming, restoring it", stage);
                if let Err(e) = fs::hard_link(&tombstone, path).await {
                    tracing::warn!("Failed to restore lock for {}: {}", stage, e);
                }
                self.remove_file(&tombstone).await?;
                Err(held(stage, &moved))
            }
            _ => self.remove_file(&tombstone).await,
        }
    }

    /// Create the lock file only if it does not exist. Returns false if it does.
    ///
    /// The record is written to a private temp file and hard-linked into
    /// place, so readers never observe a partially written lock.
    async fn try_create(&self, path: &Path, body: &[u8]) -> Result<bool, LockError> {
        let tmp = path.with_extension(format!(
            "lock.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, body)
            .await
            .map_err(|e| LockError::io(&tmp, e))?;

        let linked = fs::hard_link(&tmp, path).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            tracing::debug!("Failed to remove temp lock file {}: {}", tmp.display(), e);
        }

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LockError::io(path, e)),
        }
    }

    async fn remove_file(&self, path: &Path) -> Result<(), LockError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(path, e)),
        }
    }

    /// Release a held lock. Missing files are fine; the remote lock is untouched.
    pub async fn release(&self, lock: &DeploymentLock) -> Result<(), LockError> {
        self.release_stage(&lock.stage).await
    }

    /// Remove whatever lock file the stage has, parsable or not.
    pub async fn release_stage(&self, stage: &Stage) -> Result<(), LockError> {
        let path = self.lock_path(stage);
        self.remove_file(&path).await?;
        tracing::debug!("Released deploy lock for {}", stage);
        Ok(())
    }

    /// Read the local lock record. Absent and corrupt files both yield None.
    pub async fn file_lock(&self, stage: &Stage) -> Option<DeploymentLock> {
        read_record(&self.lock_path(stage)).await
    }

    /// Observe the remote lock, bounded by the probe timeout.
    pub async fn remote_lock_state(&self, stage: &Stage) -> RemoteLockState {
        match tokio::time::timeout(self.probe_timeout, self.backend.probe(stage)).await {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                tracing::debug!("Remote lock probe for {} failed: {}", stage, e);
                RemoteLockState::Unknown
            }
            Err(_) => {
                tracing::debug!(
                    "Remote lock probe for {} timed out after {:?}",
                    stage,
                    self.probe_timeout
                );
                RemoteLockState::Unknown
            }
        }
    }

    /// Whether the remote lock is definitely held. Ambiguity resolves to false.
    pub async fn is_remote_locked(&self, stage: &Stage) -> bool {
        self.remote_lock_state(stage).await.blocks_deploy()
    }

    /// Clear the remote lock, returning any failure.
    pub async fn try_clear_remote_lock(&self, stage: &Stage) -> Result<(), LockError> {
        self.backend
            .clear(stage)
            .await
            .map_err(|e| LockError::RemoteClear {
                stage: stage.clone(),
                message: e.to_string(),
            })
    }

    /// Best-effort remote lock clear. Failures are logged only.
    pub async fn clear_remote_lock(&self, stage: &Stage) {
        match self.try_clear_remote_lock(stage).await {
            Ok(()) => tracing::info!("Cleared remote lock for {}", stage),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    /// Clear a leftover remote lock before deploying.
    pub async fn check_and_clean_remote_lock(&self, stage: &Stage) {
        if self.is_remote_locked(stage).await {
            tracing::warn!("Remote lock found for {}, clearing it", stage);
            self.clear_remote_lock(stage).await;
        }
    }

    /// Whole minutes since the lock was created.
    pub fn lock_age_minutes(lock: &DeploymentLock) -> i64 {
        (Utc::now() - lock.created_at).num_minutes().max(0)
    }
}

fn held(stage: &Stage, existing: &DeploymentLock) -> LockError {
    LockError::Held {
        stage: stage.clone(),
        holder: existing.holder_description(),
        remaining_minutes: existing.remaining_minutes(),
        expires_at: existing.expires_at,
    }
}

async fn read_record(path: &Path) -> Option<DeploymentLock> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to read lock file {}: {}", path.display(), e);
            }
            return None;
        }
    };

    match serde_json::from_str::<DeploymentLock>(&content) {
        Ok(lock) => Some(lock),
        Err(e) => {
            tracing::warn!("Ignoring corrupt lock file {}: {}", path.display(), e);
            None
        }
    }
}
