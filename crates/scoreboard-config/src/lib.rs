use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const ENV_SCOREBOARD_CONFIG: &str = "SCOREBOARD_CONFIG";

const DEFAULT_SECTION_BATCH_SIZE: usize = 3;
const DEFAULT_SECTION_BATCH_DELAY_MS: u64 = 25;
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_LOADER_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreboardConfig {
    #[serde(default = "default_section_batch_size")]
    pub section_batch_size: usize,
    #[serde(default = "default_section_batch_delay_ms")]
    pub section_batch_delay_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_loader_channel_capacity")]
    pub loader_channel_capacity: usize,
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            section_batch_size: default_section_batch_size(),
            section_batch_delay_ms: default_section_batch_delay_ms(),
            page_size: default_page_size(),
            loader_channel_capacity: default_loader_channel_capacity(),
        }
    }
}

impl ScoreboardConfig {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.section_batch_size == 0 {
            return Err(ConfigError::configuration(
                "section_batch_size must be greater than 0",
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::configuration("page_size must be greater than 0"));
        }
        if self.loader_channel_capacity == 0 {
            return Err(ConfigError::configuration(
                "loader_channel_capacity must be greater than 0",
            ));
        }
        Ok(self)
    }
}

pub fn load_from_env() -> Result<ScoreboardConfig, ConfigError> {
    match std::env::var(ENV_SCOREBOARD_CONFIG) {
        Ok(path) if !path.trim().is_empty() => load_from_path(path.trim()),
        _ => Ok(ScoreboardConfig::default()),
    }
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ScoreboardConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|error| {
        ConfigError::configuration(format!("unable to read {}: {error}", path.display()))
    })?;
    parse(&raw)
}

pub fn parse(raw: &str) -> Result<ScoreboardConfig, ConfigError> {
    let config: ScoreboardConfig = toml::from_str(raw)
        .map_err(|error| ConfigError::configuration(format!("invalid config: {error}")))?;
    config.validate()
}

fn default_section_batch_size() -> usize {
    DEFAULT_SECTION_BATCH_SIZE
}

fn default_section_batch_delay_ms() -> u64 {
    DEFAULT_SECTION_BATCH_DELAY_MS
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_loader_channel_capacity() -> usize {
    DEFAULT_LOADER_CHANNEL_CAPACITY
}
