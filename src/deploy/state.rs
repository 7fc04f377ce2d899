// ABOUTME: Pipeline state marker types for the type state pattern.
// ABOUTME: Zero-sized types enforce valid phase order at compile time.

/// Stage lock held, nothing validated yet.
/// Available actions: `precheck()`
#[derive(Debug, Clone, Copy, Default)]
pub struct LockAcquired;

/// Preflight checks passed; no infrastructure touched.
/// Available actions: `build_deploy()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Prechecked;

/// Build and deploy commands succeeded.
/// Available actions: `postcheck()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Deployed;

/// Critical postflight checks passed.
/// Available actions: `invalidate_cache()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Verified;

/// Cache invalidated, skipped, or downgraded to a warning.
/// Available actions: `release()`
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheInvalidated;
