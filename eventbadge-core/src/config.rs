//! Configuration management
//!
//! Deployment-time settings come from the environment; the CLI may
//! override individual values.

use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_QUEUE_DIR: &str = ".eventbadge";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Remote submission endpoint; unset means every submission is queued.
    pub endpoint_url: Option<String>,
    /// Bearer credential sent with each submission.
    pub api_token: Option<String>,
    pub queue_dir: PathBuf,
    pub timeout_secs: u64,
    /// Initial value of the connectivity flag.
    pub start_offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            api_token: None,
            queue_dir: PathBuf::from(DEFAULT_QUEUE_DIR),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            start_offline: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.endpoint_url = non_empty("EVENTBADGE_ENDPOINT_URL");
        config.api_token = non_empty("EVENTBADGE_API_TOKEN");
        if let Some(dir) = non_empty("EVENTBADGE_QUEUE_DIR") {
            config.queue_dir = PathBuf::from(dir);
        }
        if let Some(raw) = non_empty("EVENTBADGE_TIMEOUT_SECS") {
            config.timeout_secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue { key: "EVENTBADGE_TIMEOUT_SECS", value: raw })?;
        }
        if let Some(raw) = non_empty("EVENTBADGE_OFFLINE") {
            config.start_offline = parse_flag(&raw)
                .ok_or(ConfigError::InvalidValue { key: "EVENTBADGE_OFFLINE", value: raw })?;
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
