//! Controller configuration
//!
//! Settings are read from a JSON file, then selected environment variables
//! override individual values. A missing file at the default location is
//! not an error; the defaults suit a terminal on the original interface
//! firmware.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Jumbo write override: a maximum length, or `ignore` to never split
pub const ENV_JUMBO: &str = "COAX_JUMBO";
pub const ENV_POLL_PERIOD_MS: &str = "COAX_POLL_PERIOD_MS";
pub const ENV_CONFIG_PATH: &str = "COAX3174_CONFIG";

/// Split length used with legacy interface firmware
pub const LEGACY_JUMBO_WRITE_MAX_LENGTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Interval between poll cycles
    pub poll_period_ms: u64,
    /// POLLs per cycle while the terminal keeps answering with data
    pub poll_depth: usize,
    /// Consecutive link errors tolerated before the session ends
    pub max_poll_retries: usize,
    /// How long the interface waits for a terminal response
    pub receive_timeout_ms: u64,
    /// Split writes longer than this many words
    pub jumbo_write_max_length: Option<usize>,
    /// Never split writes, even for legacy firmware
    pub ignore_jumbo_write: bool,
    pub serial_baud_rate: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: 66,
            poll_depth: 3,
            max_poll_retries: 3,
            receive_timeout_ms: 100,
            jumbo_write_max_length: None,
            ignore_jumbo_write: false,
            serial_baud_rate: 115200,
        }
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ControllerConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Jumbo write split length for an interface
    ///
    /// A configured length wins. Legacy firmware drops long writes, so it
    /// gets a default length unless splitting is ignored.
    pub fn jumbo_write_max_length_for(&self, legacy_firmware: bool) -> Option<usize> {
        if self.ignore_jumbo_write {
            return None;
        }
        match self.jumbo_write_max_length {
            Some(length) => Some(length),
            None if legacy_firmware => Some(LEGACY_JUMBO_WRITE_MAX_LENGTH),
            None => None,
        }
    }

    /// Load from `path`, or from the default location when `None`
    ///
    /// An explicit path must exist. Environment overrides are applied and
    /// the result validated.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    debug!("No configuration at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let label = path.display().to_string();
        let json = fs::read_to_string(path)
            .map_err(|source| ConfigError::File { path: label.clone(), source })?;
        let config = Self::from_json(&json, &label)?;
        info!("Loaded configuration from {}", label);
        Ok(config)
    }

    pub fn from_json(json: &str, label: &str) -> ConfigResult<Self> {
        serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: label.to_string(),
            source,
        })
    }

    /// Apply environment style overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_JUMBO) {
            match value.trim() {
                "ignore" => {
                    self.jumbo_write_max_length = None;
                    self.ignore_jumbo_write = true;
                }
                length => {
                    let length = length
                        .parse()
                        .map_err(|_| invalid(ENV_JUMBO, &value, "expected a length or `ignore`"))?;
                    self.jumbo_write_max_length = Some(length);
                    self.ignore_jumbo_write = false;
                }
            }
            debug!("{}={} -> {:?}", ENV_JUMBO, value, self.jumbo_write_max_length);
        }
        if let Some(value) = lookup(ENV_POLL_PERIOD_MS) {
            self.poll_period_ms = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_POLL_PERIOD_MS, &value, "expected milliseconds"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_period_ms == 0 {
            return Err(invalid("poll_period_ms", self.poll_period_ms, "must be positive"));
        }
        if self.poll_depth == 0 {
            return Err(invalid("poll_depth", self.poll_depth, "must be at least 1"));
        }
        if self.max_poll_retries == 0 {
            return Err(invalid("max_poll_retries", self.max_poll_retries, "must be at least 1"));
        }
        if self.receive_timeout_ms == 0 || self.receive_timeout_ms > u64::from(u16::MAX) {
            return Err(invalid(
                "receive_timeout_ms",
                self.receive_timeout_ms,
                "must be between 1 and 65535",
            ));
        }
        if let Some(length) = self.jumbo_write_max_length {
            if length < 2 {
                return Err(invalid("jumbo_write_max_length", length, "must be at least 2"));
            }
        }
        Ok(())
    }
}

/// Location of the configuration file
///
/// `COAX3174_CONFIG` wins, then the platform configuration directory,
/// then the current directory.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return PathBuf::from(path);
    }
    match dirs::config_dir() {
        Some(base) => base.join("coax3174").join("config.json"),
        None => PathBuf::from("coax3174.json"),
    }
}
