// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates stagehand.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

/// Write a starter `stagehand.yml`. The project name defaults to the directory name.
pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let project = match project {
        Some(p) if p.trim().is_empty() => {
            return Err(Error::InvalidConfig("project name cannot be empty".to_string()));
        }
        Some(p) => p.to_string(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "my-app".to_string()),
    };

    let config = Config::template(&project);
    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let stages: String = config
        .stages
        .iter()
        .map(|s| {
            format!(
                "  - name: {name}\n    # domain: {name}.example.com\n    # profile: {project}-{name}\n",
                name = s.name,
                project = config.project
            )
        })
        .collect();

    format!(
        r#"project: {}
infra_tool: {}
lock_ttl: {}m
tests: {}
# build: npm run build

stages:
{}"#,
        config.project,
        config.infra_tool,
        config.lock_ttl.as_secs() / 60,
        config.tests.as_deref().unwrap_or("npm test"),
        stages
    )
}
