//! User settings and preferences
//!
//! Manages application settings stored in ~/.cadastro/config.toml

use crate::config::ConnectionConfig;
use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum number of pooled connections
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,

    /// Seconds to wait for a free connection (0 = wait forever)
    #[serde(default = "default_pool_wait_timeout_secs")]
    pub pool_wait_timeout_secs: u64,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Table identifiers the boundary accepts (empty = any)
    #[serde(default)]
    pub allowed_tables: Vec<String>,
}

fn default_pool_max_size() -> usize {
    16
}

fn default_pool_wait_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pool_max_size: default_pool_max_size(),
            pool_wait_timeout_secs: default_pool_wait_timeout_secs(),
            log_level: default_log_level(),
            allowed_tables: Vec::new(),
        }
    }
}

impl Settings {
    /// Pool wait timeout, `None` meaning wait indefinitely
    pub fn pool_wait_timeout(&self) -> Option<Duration> {
        match self.pool_wait_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Load settings from config file
pub fn load_settings() -> ConfigResult<Settings> {
    let path = ConnectionConfig::config_dir()?.join("config.toml");
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
