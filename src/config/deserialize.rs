// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles the stage list, accepting bare names or detailed entries.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;

use super::StageConfig;
use crate::types::Stage;

pub fn deserialize_stages<'de, D>(deserializer: D) -> Result<NonEmpty<StageConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<StageEntry> = Vec::deserialize(deserializer)?;
    let stages = values
        .into_iter()
        .map(|entry| entry.into_stage_config())
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)?;

    let mut seen = HashSet::new();
    for stage in &stages {
        if !seen.insert(stage.name.as_str()) {
            return Err(serde::de::Error::custom(format!(
                "stage '{}' is defined more than once",
                stage.name
            )));
        }
    }

    NonEmpty::from_vec(stages)
        .ok_or_else(|| serde::de::Error::custom("at least one stage is required"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StageEntry {
    Simple(String),
    Detailed(Box<StageConfig>),
}

impl StageEntry {
    fn into_stage_config(self) -> Result<StageConfig, String> {
        match self {
            StageEntry::Simple(s) => Stage::new(&s)
                .map(StageConfig::named)
                .map_err(|e| e.to_string()),
            StageEntry::Detailed(c) => Ok(*c),
        }
    }
}
