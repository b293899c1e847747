use std::time::Duration;

use config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

pub const CONFIG_FILE: &str = "config/participant";
pub const ENV_PREFIX: &str = "QUIZ";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid log level: {0}")]
    LogLevel(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub launch: LaunchConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub discovery_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub poll_interval_ms: u64,
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Values handed to the device when it was opened, e.g. from a scanned link.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LaunchConfig {
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| ConfigError::LogLevel(self.level.clone()))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Self::from_settings(settings)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(config::Config::builder()
            .set_default("session.poll_interval_ms", 2000)?
            .set_default("log.level", "info")?)
    }

    pub fn from_settings(settings: config::Config) -> Result<Self, ConfigError> {
        let api = settings.get::<ApiConfig>("api").unwrap_or_default();
        let launch = settings.get::<LaunchConfig>("launch").unwrap_or_default();
        let session = settings.get::<SessionConfig>("session")?;
        let log = settings.get::<LogConfig>("log")?;

        Ok(Self {
            api,
            session,
            launch,
            log,
        })
    }
}
