// ABOUTME: Configuration types and parsing for stagehand.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and stage merging.

mod deserialize;
mod env_value;
mod init;
mod stage;

pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use stage::{CacheConfig, CheckCommandConfig, HealthConfig, StageConfig, StageSettings};

use deserialize::deserialize_stages;

use crate::error::{Error, Result};
use crate::lock::{DEFAULT_LOCK_TTL, DEFAULT_PROBE_TIMEOUT};
use crate::types::Stage;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stagehand.yml";
pub const CONFIG_FILENAME_ALT: &str = "stagehand.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stagehand/config.yml";

pub const DEFAULT_INFRA_TOOL: &str = "npx sst";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project: String,

    /// Command prefix for the infrastructure tool.
    #[serde(default = "default_infra_tool")]
    pub infra_tool: String,

    #[serde(default = "default_lock_ttl", with = "humantime_serde")]
    pub lock_ttl: Duration,

    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Build command; omitted for self-building infrastructure tools.
    #[serde(default)]
    pub build: Option<String>,

    #[serde(default)]
    pub tests: Option<String>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub preflight: Vec<CheckCommandConfig>,

    #[serde(default)]
    pub postflight: Vec<CheckCommandConfig>,

    #[serde(deserialize_with = "deserialize_stages")]
    pub stages: NonEmpty<StageConfig>,
}

fn default_infra_tool() -> String {
    DEFAULT_INFRA_TOOL.to_string()
}

fn default_lock_ttl() -> Duration {
    DEFAULT_LOCK_TTL
}

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::InvalidConfig("project name cannot be empty".to_string()));
        }
        if self.infra_tool.trim().is_empty() {
            return Err(Error::InvalidConfig("infra_tool cannot be empty".to_string()));
        }
        if self.lock_ttl.is_zero() {
            return Err(Error::InvalidConfig("lock_ttl must be positive".to_string()));
        }
        for stage in &self.stages {
            if stage.lock_ttl.is_some_and(|ttl| ttl.is_zero()) {
                return Err(Error::InvalidConfig(format!(
                    "stage '{}': lock_ttl must be positive",
                    stage.name
                )));
            }
            if stage.health.as_ref().is_some_and(|h| h.attempts == 0) {
                return Err(Error::InvalidConfig(format!(
                    "stage '{}': health.attempts must be at least 1",
                    stage.name
                )));
            }
        }
        Ok(())
    }

    pub fn stage_names(&self) -> Vec<&Stage> {
        self.stages.iter().map(|s| &s.name).collect()
    }

    pub fn stage(&self, name: &str) -> Result<&StageConfig> {
        self.stages
            .iter()
            .find(|s| s.name.as_str() == name)
            .ok_or_else(|| Error::UnknownStage(name.to_string()))
    }

    /// Merge project-wide settings with a stage's overrides.
    pub fn for_stage(&self, name: &str) -> Result<StageSettings> {
        let stage = self.stage(name)?;

        // Deep merge env
        let mut env = self.env.clone();
        for (k, v) in &stage.env {
            env.insert(k.clone(), v.clone());
        }

        let mut preflight = self.preflight.clone();
        preflight.extend(stage.preflight.iter().cloned());

        let mut postflight = self.postflight.clone();
        postflight.extend(stage.postflight.iter().cloned());

        Ok(StageSettings {
            stage: stage.name.clone(),
            project: self.project.clone(),
            infra_tool: self.infra_tool.clone(),
            lock_ttl: stage.lock_ttl.unwrap_or(self.lock_ttl),
            probe_timeout: self.probe_timeout,
            build: self.build.clone(),
            tests: if stage.skip_tests {
                None
            } else {
                self.tests.clone()
            },
            domain: stage.domain.clone(),
            profile: stage.profile.clone(),
            deploy_script: stage.deploy_script.clone(),
            allow_dirty: stage.allow_dirty,
            env,
            cache: stage.cache.clone(),
            health: stage.health.clone(),
            origin_url: stage.origin_url.clone(),
            database: stage.database.clone(),
            backup: stage.backup.clone(),
            preflight,
            postflight,
        })
    }

    pub fn template(project: &str) -> Self {
        Config {
            project: project.to_string(),
            infra_tool: default_infra_tool(),
            lock_ttl: default_lock_ttl(),
            probe_timeout: default_probe_timeout(),
            build: None,
            tests: Some("npm test".to_string()),
            env: HashMap::new(),
            preflight: Vec::new(),
            postflight: Vec::new(),
            stages: NonEmpty {
                head: StageConfig::named(Stage::staging()),
                tail: vec![StageConfig::named(Stage::production())],
            },
        }
    }
}
