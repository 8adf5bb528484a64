//! Runtime configuration: TOML file → validated [`RuntimeConfig`], plus the
//! shared [`ConfigBuffer`] threads read live settings from.

use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::control::ControllerSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::hub::{HubSettings, MotorLimits};
use crate::sensor::SensorSettings;
use crate::tasks::ControlLoopSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub duration_secs: u64,
    pub log_level: String,
    pub actuation_interval_ms: u64,
    pub diagnostic_log_size: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            log_level: "info".to_string(),
            actuation_interval_ms: 20,
            diagnostic_log_size: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub controller: ControllerSettings,
    pub control_loop: ControlLoopSettings,
    pub hub: HubSettings,
    pub sensor: SensorSettings,
    pub motor: MotorLimits,
    pub run: RunSettings,
}

impl RuntimeConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.controller.validate()?;
        self.control_loop.validate()?;
        self.hub.validate()?;
        self.sensor.validate()?;
        self.motor.validate()?;
        if self.run.actuation_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "run.actuation_interval_ms",
                reason: "must be at least 1 ms".to_string(),
            });
        }
        if self.run.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid {
                field: "run.log_level",
                reason: format!("unknown level '{}'", self.run.log_level),
            });
        }
        Ok(())
    }
}

pub fn parse_config(text: &str) -> ConfigResult<RuntimeConfig> {
    let config: RuntimeConfig =
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a config file. A missing file means defaults; a file that
/// exists but does not parse or validate is an error.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<RuntimeConfig> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("[CONFIG] {} not found, using defaults", path.display());
            Ok(RuntimeConfig::default())
        }
        Err(e) => Err(ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

// Live configuration shared between threads (Mutex)
#[derive(Clone)]
pub struct ConfigBuffer {
    data: Arc<Mutex<RuntimeConfig>>,
}

impl ConfigBuffer {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            data: Arc::new(Mutex::new(config)),
        }
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut RuntimeConfig),
    {
        let mut config = self.data.lock();
        f(&mut config);
    }

    pub fn get(&self) -> RuntimeConfig {
        self.data.lock().clone()
    }

    /// Read a single setting under the lock without cloning the whole config.
    pub fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&RuntimeConfig) -> R,
    {
        f(&self.data.lock())
    }
}

impl Default for ConfigBuffer {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
