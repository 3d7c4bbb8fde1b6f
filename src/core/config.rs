use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

fn default_setup_path() -> String {
    "/setup".to_string()
}

fn default_latest_path() -> String {
    "/latest".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default = "default_setup_path")]
    pub setup_path: String,
    #[serde(default = "default_latest_path")]
    pub latest_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl ProviderConfig {
    pub fn new(base_url: &str) -> Self {
        ProviderConfig {
            base_url: base_url.to_string(),
            setup_path: default_setup_path(),
            latest_path: default_latest_path(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "oraclefeed", "oraclefeed")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            bail!("provider.base_url must not be empty");
        }
        if self.provider.timeout_secs == 0 {
            bail!("provider.timeout_secs must be greater than zero");
        }
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
