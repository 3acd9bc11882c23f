//! Typed configuration.
//!
//! Defaults, then an optional TOML file, then environment variables. Loads
//! once at startup and fails fast on malformed values.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::QueueOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub queue: QueueOptions,
    pub log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otel_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            queue: QueueOptions::default(),
            log_level: "info".to_string(),
            otel_endpoint: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables alone.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))?;
        config.with_env_overrides()
    }

    /// Override fields with any of `JOBQ_ENVIRONMENT`, `JOBQ_WORKERS`,
    /// `JOBQ_CHANNEL_SIZE`, `LOG_LEVEL`, `OTEL_ENDPOINT` that are set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(environment) = parsed_var("JOBQ_ENVIRONMENT")? {
            self.environment = environment;
        }
        if let Some(workers) = parsed_var("JOBQ_WORKERS")? {
            self.queue.workers = workers;
        }
        if let Some(channel_size) = parsed_var("JOBQ_CHANNEL_SIZE")? {
            self.queue.channel_size = channel_size;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(endpoint) = std::env::var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        Ok(self)
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {raw:?} ({e})"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Config(format!("cannot read {name}: {e}"))),
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!(
                "expected one of 'development,production,test', got '{other}'"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        write!(f, "{s}")
    }
}
