use std::env;
use std::time::Duration;

use medscan_api_client::{DEFAULT_TIMEOUT_MS, HealthApiClientConfig, UserProfile};
use medscan_chat_core::{DEFAULT_REVEAL_INTERVAL, RevealMode};
use thiserror::Error;

use crate::ShellCli;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub reveal_interval_ms: u64,
    pub profile: UserProfile,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MEDSCAN_BASE_URL must not be empty")]
    EmptyBaseUrl,
    #[error("invalid MEDSCAN_TIMEOUT_MS: {0}")]
    InvalidTimeoutMs(String),
    #[error("invalid MEDSCAN_REVEAL_INTERVAL_MS: {0}")]
    InvalidRevealIntervalMs(String),
    #[error("invalid MEDSCAN_AGE: {0}")]
    InvalidAge(String),
}

impl ShellConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = UserProfile::default();
        let base_url = lookup("MEDSCAN_BASE_URL")
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        let timeout_ms = lookup("MEDSCAN_TIMEOUT_MS")
            .unwrap_or_else(|| DEFAULT_TIMEOUT_MS.to_string())
            .trim()
            .parse::<u64>()
            .map_err(|error| ConfigError::InvalidTimeoutMs(error.to_string()))?;
        let reveal_interval_ms = lookup("MEDSCAN_REVEAL_INTERVAL_MS")
            .unwrap_or_else(|| DEFAULT_REVEAL_INTERVAL.as_millis().to_string())
            .trim()
            .parse::<u64>()
            .map_err(|error| ConfigError::InvalidRevealIntervalMs(error.to_string()))?;
        let age = match lookup("MEDSCAN_AGE") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|error| ConfigError::InvalidAge(error.to_string()))?,
            None => defaults.age,
        };
        let language = lookup("MEDSCAN_LANGUAGE")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.language);
        let literacy_level = lookup("MEDSCAN_LITERACY_LEVEL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.literacy_level);

        Ok(Self {
            base_url,
            timeout_ms,
            reveal_interval_ms,
            profile: UserProfile {
                age,
                language,
                literacy_level,
            },
        })
    }

    /// Command-line flags win over the environment.
    pub fn apply_cli(&mut self, cli: &ShellCli) {
        if let Some(base_url) = &cli.base_url {
            self.base_url.clone_from(base_url);
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(interval) = cli.reveal_interval_ms {
            self.reveal_interval_ms = interval;
        }
        if let Some(age) = cli.age {
            self.profile.age = age;
        }
        if let Some(language) = &cli.language {
            self.profile.language.clone_from(language);
        }
        if let Some(level) = &cli.literacy_level {
            self.profile.literacy_level.clone_from(level);
        }
    }

    pub fn api_config(&self) -> HealthApiClientConfig {
        HealthApiClientConfig {
            base_url: self.base_url.clone(),
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn reveal_mode(&self) -> RevealMode {
        if self.reveal_interval_ms == 0 {
            RevealMode::Instant
        } else {
            RevealMode::Typewriter {
                interval: Duration::from_millis(self.reveal_interval_ms),
            }
        }
    }
}
