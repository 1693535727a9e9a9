use std::path::Path;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::constants::{
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_LONG_POLL_INTERVAL_MS, DEFAULT_SCAN_TIMEOUT_SECS,
    DEFAULT_SHORT_POLL_INTERVAL_MS,
};
use crate::core::bluetooth::PollPeriods;
use crate::error::ConfigError;
use crate::utils::ensure_directory_exists;

pub const DEFAULT_CONFIG_FILE: &str = "lunchbox_config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// MAC address (or platform device id) of the Lunchbox peripheral.
    pub device_address: String,

    /// Connect as soon as the transport is initialized.
    pub auto_connect: bool,

    /// Polling period while only the first sensor is present.
    pub short_poll_interval_ms: u64,

    /// Polling period once the second sensor is present.
    pub long_poll_interval_ms: u64,

    /// Capacity of the controller mailbox.
    pub event_channel_capacity: usize,

    /// How long the transport scans for the device before giving up.
    pub scan_timeout_secs: u64,

    /// Default log filter, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            device_address: String::new(),
            auto_connect: true,
            short_poll_interval_ms: DEFAULT_SHORT_POLL_INTERVAL_MS,
            long_poll_interval_ms: DEFAULT_LONG_POLL_INTERVAL_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn poll_periods(&self) -> PollPeriods {
        PollPeriods {
            short: Duration::from_millis(self.short_poll_interval_ms),
            long: Duration::from_millis(self.long_poll_interval_ms),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Rejects values the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.short_poll_interval_ms == 0 || self.long_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll intervals must be positive".into()));
        }
        if self.long_poll_interval_ms < self.short_poll_interval_ms {
            return Err(ConfigError::Invalid(
                "long_poll_interval_ms must not be shorter than short_poll_interval_ms".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid("event_channel_capacity must be positive".into()));
        }
        if self.auto_connect && self.device_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "device_address is required when auto_connect is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_path = file_path.as_ref();

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;
        config.validate()?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file_path = file_path.as_ref();
        self.validate()?;
        if let Some(config_dir) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory_exists(config_dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize controller config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;

        info!("Controller config saved to {:?}.", file_path);
        Ok(())
    }
}
