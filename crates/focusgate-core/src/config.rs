//! Detector timing configuration.
//!
//! Four windows govern the detector's behavior:
//! - Stability window: dwell time a foreign pick must persist before a block
//! - Debounce window: coalescing interval for bursts of surface signals
//! - Unknown grace: how long total signal loss is tolerated before blocking
//! - Signal freshness: how long a change notification counts as live evidence
//!
//! All values are milliseconds. Hosts load overrides from TOML; absent keys
//! fall back to the defaults below.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::config_dir;

/// Timing knobs for the foreground intrusion detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum dwell time a foreign pick must persist before it may block.
    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: u64,
    /// Coalescing interval for bursts of surface-change notifications.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,
    /// Tolerated duration of total signal loss before it counts as foreign.
    #[serde(default = "default_unknown_grace_ms")]
    pub unknown_grace_ms: u64,
    /// Horizon within which the last change notification still outranks
    /// nothing; older signals only feed the home-context fallback.
    #[serde(default = "default_signal_freshness_ms")]
    pub signal_freshness_ms: u64,
}

// Default functions
fn default_stability_window_ms() -> u64 {
    200
}
fn default_debounce_window_ms() -> u64 {
    250
}
fn default_unknown_grace_ms() -> u64 {
    250
}
fn default_signal_freshness_ms() -> u64 {
    1000
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            stability_window_ms: default_stability_window_ms(),
            debounce_window_ms: default_debounce_window_ms(),
            unknown_grace_ms: default_unknown_grace_ms(),
            signal_freshness_ms: default_signal_freshness_ms(),
        }
    }
}

impl DetectorConfig {
    /// Path of the config file under the platform config directory.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        Ok(config_dir()?.join("detector.toml"))
    }

    /// Load from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &PathBuf) -> Result<Self, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::LoadFailed {
                path: path.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory is available or the file
    /// cannot be parsed.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from the default path, falling back to defaults on any failure.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &PathBuf) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| StoreError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Persist to the default path, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory is available or the write
    /// fails.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::default_path()?)
    }
}
