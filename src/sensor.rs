//! Sensor module - barometer readings, altitude filtering, simulation

pub mod barometer;
pub mod filter;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub use barometer::{altitude_from_pressure, pressure_at_altitude, SimulatedBarometer};
pub use filter::AltitudeFilter;

/// One raw barometer acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub temperature: f32,
    pub pressure: f32,
    pub altitude: f32,
}

/// Boundary to the barometer driver. `None` means no valid reading this cycle.
pub trait AltitudeSource: Send {
    fn read(&mut self) -> Option<RawReading>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub interval_ms: u64,
    pub filter_window: usize,
    pub seed: u64,
    /// Simulated pressure noise, expressed in metres of altitude.
    pub noise_m: f32,
    pub start_altitude_m: f32,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            filter_window: 5,
            seed: 42,
            noise_m: 0.3,
            start_altitude_m: 120.0,
        }
    }
}

impl SensorSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sensor.interval_ms",
                reason: "must be at least 1 ms".to_string(),
            });
        }
        if self.filter_window == 0 {
            return Err(ConfigError::Invalid {
                field: "sensor.filter_window",
                reason: "must average at least one sample".to_string(),
            });
        }
        if !self.noise_m.is_finite() || self.noise_m < 0.0 {
            return Err(ConfigError::Invalid {
                field: "sensor.noise_m",
                reason: format!("must be finite and non-negative, got {}", self.noise_m),
            });
        }
        Ok(())
    }
}
