// ABOUTME: Integration tests for the per-stage lock manager.
// ABOUTME: Covers acquisition, staleness, corruption, remote probing and isolation.

mod support;

use chrono::{TimeDelta, Utc};
use stagehand::lock::{
    DeploymentLock, LockError, LockErrorKind, LockManager, LockTtl, RemoteLockState,
};
use stagehand::types::Stage;
use std::sync::Arc;
use std::time::Duration;
use support::{FakeBackend, lock_manager, staging};
use tempfile::TempDir;

fn manager(dir: &TempDir) -> Arc<LockManager> {
    lock_manager(dir.path(), Arc::new(FakeBackend::default()))
}

async fn write_lock(manager: &LockManager, lock: &DeploymentLock) {
    let path = manager.lock_path(&lock.stage);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, serde_json::to_vec(lock).unwrap()).unwrap();
}

mod acquire {
    use super::*;

    #[tokio::test]
    async fn second_acquire_reports_remaining_minutes() {
        support::init_tracing();
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);

        locks.acquire(&staging(), "first").await.unwrap();
        let err = locks.acquire(&staging(), "second").await.unwrap_err();

        assert_eq!(err.kind(), LockErrorKind::Held);
        assert_eq!(err.remaining_minutes(), Some(120));
        let message = err.to_string();
        assert!(message.contains("120"), "message: {message}");
        assert!(message.contains("stagehand recover staging"), "message: {message}");
    }

    #[tokio::test]
    async fn release_then_acquire_succeeds() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);

        let lock = locks.acquire(&staging(), "first").await.unwrap();
        locks.release(&lock).await.unwrap();
        locks.acquire(&staging(), "second").await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_is_reclaimed_without_release() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);

        let created = Utc::now() - TimeDelta::minutes(180);
        let stale = DeploymentLock::starting_at(&staging(), "crashed", LockTtl::default(), created);
        write_lock(&locks, &stale).await;

        let lock = locks.acquire(&staging(), "fresh").await.unwrap();
        assert_eq!(lock.reason, "fresh");
        assert_eq!(locks.file_lock(&staging()).await.unwrap().reason, "fresh");
    }

    #[tokio::test]
    async fn corrupt_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        let path = locks.lock_path(&staging());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        locks.acquire(&staging(), "fresh").await.unwrap();
    }

    #[tokio::test]
    async fn expiry_is_ttl_after_creation() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);

        let before = Utc::now();
        let lock = locks.acquire(&staging(), "deploy").await.unwrap();

        let expected = before + TimeDelta::minutes(120);
        let drift = (lock.expires_at - expected).num_milliseconds().abs();
        assert!(drift <= 1000, "drift {drift}ms");
        assert!(lock.expires_at > lock.created_at);
    }

    #[tokio::test]
    async fn custom_ttl_is_applied() {
        let dir = TempDir::new().unwrap();
        let locks = LockManager::new(dir.path(), Arc::new(FakeBackend::default()))
            .with_ttl(LockTtl::new(Duration::from_secs(15 * 60)).unwrap());

        let lock = locks.acquire(&staging(), "deploy").await.unwrap();
        assert_eq!(lock.expires_at - lock.created_at, TimeDelta::minutes(15));
    }

    #[tokio::test]
    async fn stages_lock_independently() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);

        locks.acquire(&staging(), "deploy").await.unwrap();
        locks
            .acquire(&Stage::production(), "deploy")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_acquires_yield_one_winner() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);

        let attempts = (0..8).map(|i| {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(&staging(), &format!("attempt {i}")).await })
        });
        let results = futures::future::join_all(attempts).await;

        let winners = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reclaim_of_expired_lock_yields_one_winner() {
        for round in 0..100 {
            let dir = TempDir::new().unwrap();
            let locks = manager(&dir);
            let created = Utc::now() - TimeDelta::minutes(180);
            let stale =
                DeploymentLock::starting_at(&staging(), "crashed", LockTtl::default(), created);
            write_lock(&locks, &stale).await;

            let attempts = (0..8).map(|i| {
                let locks = locks.clone();
                tokio::spawn(async move { locks.acquire(&staging(), &format!("attempt {i}")).await })
            });
            let results = futures::future::join_all(attempts).await;

            let winners: Vec<_> = results
                .into_iter()
                .map(|r| r.unwrap())
                .filter_map(Result::ok)
                .collect();
            assert_eq!(winners.len(), 1, "round {round}");

            let on_disk = locks.file_lock(&staging()).await.unwrap();
            assert_eq!(on_disk.reason, winners[0].reason, "round {round}");
        }
    }

    #[tokio::test]
    async fn reclaim_leaves_no_tombstones() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        let created = Utc::now() - TimeDelta::minutes(180);
        let stale = DeploymentLock::starting_at(&staging(), "crashed", LockTtl::default(), created);
        write_lock(&locks, &stale).await;

        locks.acquire(&staging(), "fresh").await.unwrap();

        let lock_dir = locks.lock_path(&staging()).parent().unwrap().to_path_buf();
        let leftovers: Vec<String> = std::fs::read_dir(lock_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".stale") || name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }
}

mod release {
    use super::*;

    #[tokio::test]
    async fn release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);

        let lock = locks.acquire(&staging(), "deploy").await.unwrap();
        locks.release(&lock).await.unwrap();
        locks.release(&lock).await.unwrap();
    }

    #[tokio::test]
    async fn release_does_not_touch_remote_lock() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::with_state(RemoteLockState::Locked));
        let locks = lock_manager(dir.path(), backend.clone());

        let lock = locks.acquire(&staging(), "deploy").await.unwrap();
        locks.release(&lock).await.unwrap();

        assert_eq!(backend.clear_count(), 0);
    }
}

mod file_lock {
    use super::*;

    #[tokio::test]
    async fn absent_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(manager(&dir).file_lock(&staging()).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_none() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        let path = locks.lock_path(&staging());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "garbage").unwrap();

        assert!(locks.file_lock(&staging()).await.is_none());
    }

    #[tokio::test]
    async fn record_uses_camel_case_keys() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        locks.acquire(&staging(), "deploy").await.unwrap();

        let raw = std::fs::read_to_string(locks.lock_path(&staging())).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["stage"], "staging");
        assert_eq!(json["reason"], "deploy");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("expiresAt").is_some());
    }

    #[tokio::test]
    async fn record_without_holder_still_loads() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        let path = locks.lock_path(&staging());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"stage":"staging","createdAt":"2026-01-01T10:00:00Z","expiresAt":"2026-01-01T12:00:00Z","reason":"ci"}"#,
        )
        .unwrap();

        let lock = locks.file_lock(&staging()).await.unwrap();
        assert_eq!(lock.reason, "ci");
        assert!(lock.holder.is_none());
    }
}

mod isolation {
    use super::*;

    #[tokio::test]
    async fn managers_for_different_roots_do_not_interfere() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let a = manager(&first);
        let b = manager(&second);

        let lock = a.acquire(&staging(), "a").await.unwrap();
        b.acquire(&staging(), "b").await.unwrap();

        a.release(&lock).await.unwrap();
        assert!(b.file_lock(&staging()).await.is_some());
    }
}

mod remote {
    use super::*;

    #[tokio::test]
    async fn unknown_state_counts_as_unlocked() {
        let dir = TempDir::new().unwrap();
        let locks = lock_manager(
            dir.path(),
            Arc::new(FakeBackend::with_state(RemoteLockState::Unknown)),
        );
        assert!(!locks.is_remote_locked(&staging()).await);
    }

    #[tokio::test]
    async fn probe_timeout_counts_as_unlocked() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            probe_delay: Some(Duration::from_secs(5)),
            ..FakeBackend::with_state(RemoteLockState::Locked)
        };
        let locks = LockManager::new(dir.path(), Arc::new(backend))
            .with_probe_timeout(Duration::from_millis(20));

        assert!(!locks.is_remote_locked(&staging()).await);
    }

    #[tokio::test]
    async fn locked_remote_is_cleared_before_deploy() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::with_state(RemoteLockState::Locked));
        let locks = lock_manager(dir.path(), backend.clone());

        assert!(locks.is_remote_locked(&staging()).await);
        locks.check_and_clean_remote_lock(&staging()).await;

        assert_eq!(backend.clear_count(), 1);
        assert!(!locks.is_remote_locked(&staging()).await);
    }

    #[tokio::test]
    async fn unlocked_remote_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::with_state(RemoteLockState::Unlocked));
        let locks = lock_manager(dir.path(), backend.clone());

        locks.check_and_clean_remote_lock(&staging()).await;
        assert_eq!(backend.clear_count(), 0);
    }

    #[tokio::test]
    async fn best_effort_clear_swallows_failure() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::with_state(RemoteLockState::Locked));
        *backend.fail_clear.lock() = true;
        let locks = lock_manager(dir.path(), backend.clone());

        locks.clear_remote_lock(&staging()).await;

        let err = locks.try_clear_remote_lock(&staging()).await.unwrap_err();
        assert!(matches!(err, LockError::RemoteClear { .. }));
        assert_eq!(backend.clear_count(), 2);
    }
}
