// ABOUTME: Validated deployment stage name (e.g. staging, production).
// ABOUTME: Stage names double as lock file names, so path characters are rejected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("stage name cannot be empty")]
    Empty,

    #[error("stage name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("stage name cannot start or end with a hyphen")]
    EdgeHyphen,

    #[error("stage name must be lowercase")]
    NotLowercase,

    #[error("invalid character in stage name: '{0}'")]
    InvalidChar(char),
}

/// A named deploy target with its own domain, lock and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stage(String);

impl Stage {
    pub fn new(value: &str) -> Result<Self, StageError> {
        if value.is_empty() {
            return Err(StageError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(StageError::TooLong);
        }

        if value.starts_with('-') || value.ends_with('-') {
            return Err(StageError::EdgeHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(StageError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
                return Err(StageError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn staging() -> Self {
        Self("staging".to_string())
    }

    pub fn production() -> Self {
        Self("production".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Production-like stages get extra caution in guidance text.
    pub fn is_production(&self) -> bool {
        matches!(self.0.as_str(), "prod" | "production")
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Stage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::new(s)
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Stage::new(&s).map_err(serde::de::Error::custom)
    }
}
