use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Gains and limits of the altitude controller.
///
/// This is the only sanctioned way to reconfigure a running controller in bulk:
/// it is validated here, then applied between two control cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Nominal period of the control loop.
    pub update_interval_ms: u32,
    /// Anti-windup bound of the integral accumulator.
    pub error_sum_limit: f32,
    /// Calls closer together than this are skipped with a neutral output.
    pub min_elapsed_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.1,
            kd: 1.0,
            update_interval_ms: 100,
            error_sum_limit: 20.0,
            min_elapsed_ms: 10,
        }
    }
}

impl ControllerSettings {
    pub fn with_gains(mut self, kp: f32, ki: f32, kd: f32) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (field, gain) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            validate_gain(field, gain)?;
        }
        if !self.error_sum_limit.is_finite() || self.error_sum_limit <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "error_sum_limit",
                reason: format!("must be a positive number, got {}", self.error_sum_limit),
            });
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "update_interval_ms",
                reason: "must be at least 1 ms".to_string(),
            });
        }
        if self.min_elapsed_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "min_elapsed_ms",
                reason: "must be at least 1 ms to keep the derivative bounded".to_string(),
            });
        }
        Ok(())
    }
}

/// Gains may be zero (term disabled) but never negative or non-finite.
pub fn validate_gain(field: &'static str, gain: f32) -> ConfigResult<()> {
    if gain.is_finite() && gain >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("gain must be finite and non-negative, got {gain}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_tuning() {
        let s = ControllerSettings::default();
        assert_eq!((s.kp, s.ki, s.kd), (2.0, 0.1, 1.0));
        assert_eq!(s.update_interval_ms, 100);
        assert_eq!(s.error_sum_limit, 20.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_windup_limit() {
        let s = ControllerSettings {
            error_sum_limit: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Invalid { field: "error_sum_limit", .. })
        ));
    }

    #[test]
    fn rejects_nan_and_negative_gains() {
        assert!(ControllerSettings::default().with_gains(f32::NAN, 0.0, 0.0).validate().is_err());
        assert!(ControllerSettings::default().with_gains(1.0, -0.1, 0.0).validate().is_err());
        assert!(ControllerSettings::default().with_gains(0.0, 0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let s: ControllerSettings = toml::from_str("kp = 3.5").unwrap();
        assert_eq!(s.kp, 3.5);
        assert_eq!(s.ki, 0.1);
        assert_eq!(s.min_elapsed_ms, 10);
    }
}
