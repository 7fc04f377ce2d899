// ABOUTME: Per-stage configuration and the merged settings used for one deploy.
// ABOUTME: Stage entries may be a bare name or a detailed mapping.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::Stage;

use super::EnvValue;

/// A user-defined check command from `preflight:` or `postflight:`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckCommandConfig {
    pub name: String,
    /// Shell command line, run from the project root.
    pub run: String,
    /// Substring that must appear in stdout for the check to pass.
    #[serde(default)]
    pub expect: Option<String>,
    /// Postflight only: fail the deploy instead of warning.
    #[serde(default)]
    pub critical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub distribution_id: Option<String>,
    #[serde(default = "default_invalidation_paths")]
    pub paths: Vec<String>,
    #[serde(default)]
    pub skip: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            distribution_id: None,
            paths: default_invalidation_paths(),
            skip: false,
        }
    }
}

impl CacheConfig {
    /// Distribution to invalidate, unless skipped or unset.
    pub fn target(&self) -> Option<&str> {
        if self.skip {
            None
        } else {
            self.distribution_id.as_deref()
        }
    }
}

fn default_invalidation_paths() -> Vec<String> {
    vec!["/*".to_string()]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthConfig {
    pub url: String,
    #[serde(default = "default_health_attempts")]
    pub attempts: u32,
    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub interval: Duration,
}

fn default_health_attempts() -> u32 {
    5
}

fn default_health_interval() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    pub name: Stage,

    #[serde(default)]
    pub domain: Option<String>,

    /// Named cloud credential profile.
    #[serde(default)]
    pub profile: Option<String>,

    /// Custom deploy script, relative to the project root.
    #[serde(default)]
    pub deploy_script: Option<PathBuf>,

    #[serde(default, with = "humantime_serde")]
    pub lock_ttl: Option<Duration>,

    #[serde(default)]
    pub skip_tests: bool,

    #[serde(default)]
    pub allow_dirty: bool,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub health: Option<HealthConfig>,

    /// Origin that must not be reachable directly.
    #[serde(default)]
    pub origin_url: Option<String>,

    /// Command probing database reachability.
    #[serde(default)]
    pub database: Option<String>,

    /// Command run before deploying; prints the backup path last.
    #[serde(default)]
    pub backup: Option<String>,

    #[serde(default)]
    pub preflight: Vec<CheckCommandConfig>,

    #[serde(default)]
    pub postflight: Vec<CheckCommandConfig>,
}

impl StageConfig {
    /// A stage with every setting at its default.
    pub fn named(name: Stage) -> Self {
        Self {
            name,
            domain: None,
            profile: None,
            deploy_script: None,
            lock_ttl: None,
            skip_tests: false,
            allow_dirty: false,
            env: HashMap::new(),
            cache: CacheConfig::default(),
            health: None,
            origin_url: None,
            database: None,
            backup: None,
            preflight: Vec::new(),
            postflight: Vec::new(),
        }
    }
}

/// Project settings merged with one stage's overrides.
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub stage: Stage,
    pub project: String,
    pub infra_tool: String,
    pub lock_ttl: Duration,
    pub probe_timeout: Duration,
    pub build: Option<String>,
    /// None when the stage skips tests.
    pub tests: Option<String>,
    pub domain: Option<String>,
    pub profile: Option<String>,
    pub deploy_script: Option<PathBuf>,
    pub allow_dirty: bool,
    pub env: HashMap<String, EnvValue>,
    pub cache: CacheConfig,
    pub health: Option<HealthConfig>,
    pub origin_url: Option<String>,
    pub database: Option<String>,
    pub backup: Option<String>,
    pub preflight: Vec<CheckCommandConfig>,
    pub postflight: Vec<CheckCommandConfig>,
}
