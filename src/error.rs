//! Error types shared across the controller, the hub and configuration loading.
//!
//! None of these are fatal: every caller in the control loop maps them onto a
//! "hold the last known value" fallback.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("cannot calibrate: sensor has not produced a valid reading (got {0})")]
    InvalidCalibration(f32),

    #[error("controller settings rejected: {0}")]
    InvalidSettings(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HubError {
    #[error("{resource} lock still busy after {attempts} attempts")]
    LockTimeout {
        resource: &'static str,
        attempts: u32,
    },

    #[error("sensor snapshot timestamp went backwards ({incoming_ms} ms < {current_ms} ms)")]
    TimestampRegression { current_ms: u64, incoming_ms: u64 },

    #[error("{0} channel disconnected")]
    Disconnected(&'static str),

    #[error("shutdown requested while waiting on the {0} channel")]
    ShutdownRequested(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ControlResult<T> = Result<T, ControlError>;
pub type HubResult<T> = Result<T, HubError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
