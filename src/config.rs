use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a non-matched stage means for the rest of its pipeline. The exact
/// behavior is a policy decision, so it is configurable and both variants
/// are exercised by tests.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StageContinuation {
    /// A non-matched stage stops the remaining stages of that pipeline.
    #[default]
    MatchGated,
    /// Every stage runs regardless of earlier stage outcomes.
    RunAll,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub continuation: StageContinuation,

    /// Per-rule counters and timing samples; disabling skips all recording.
    #[serde(default = "default_rule_metrics")]
    pub rule_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            continuation: StageContinuation::default(),
            rule_metrics: default_rule_metrics(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn default_rule_metrics() -> bool {
    true
}
