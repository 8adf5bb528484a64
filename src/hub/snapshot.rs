use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Latest barometer state, written by the sensor thread only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub temperature: f32,
    pub pressure: f32,
    pub raw_altitude: f32,
    pub filtered_altitude: f32,
    pub last_read_ms: u64,
}

impl SensorSnapshot {
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        AltitudeSample::from(self).age_ms(now_ms)
    }

    pub fn is_stale(&self, now_ms: u64, threshold_ms: u64) -> bool {
        AltitudeSample::from(self).is_stale(now_ms, threshold_ms)
    }

    /// The zeroed snapshot the hub starts with carries no reading.
    pub fn has_reading(&self) -> bool {
        self.filtered_altitude != 0.0
    }
}

/// What travels on the altitude-sample channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AltitudeSample {
    pub altitude: f32,
    pub timestamp_ms: u64,
}

impl AltitudeSample {
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }

    /// Older than the threshold means unreliable; exactly at it is still usable.
    pub fn is_stale(&self, now_ms: u64, threshold_ms: u64) -> bool {
        self.age_ms(now_ms) > threshold_ms
    }
}

impl From<&SensorSnapshot> for AltitudeSample {
    fn from(s: &SensorSnapshot) -> Self {
        Self {
            altitude: s.filtered_altitude,
            timestamp_ms: s.last_read_ms,
        }
    }
}

/// Inclusive bounds for one motor channel, always inside `[-100, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: i32,
    pub max: i32,
}

impl ChannelRange {
    pub const FULL: ChannelRange = ChannelRange { min: -100, max: 100 };

    pub fn clamp(&self, speed: i32) -> i32 {
        speed.clamp(self.min, self.max)
    }

    fn validate(&self, field: &'static str) -> ConfigResult<()> {
        if self.min < -100 || self.max > 100 || self.min > self.max {
            return Err(ConfigError::Invalid {
                field,
                reason: format!(
                    "range [{}, {}] must be ordered and inside [-100, 100]",
                    self.min, self.max
                ),
            });
        }
        Ok(())
    }
}

impl Default for ChannelRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Per-channel actuator ranges. Lift and lateral motors are bounded independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorLimits {
    pub lift: ChannelRange,
    pub lateral: ChannelRange,
}

impl MotorLimits {
    pub fn validate(&self) -> ConfigResult<()> {
        self.lift.validate("motor.lift")?;
        self.lateral.validate("motor.lateral")
    }
}

/// Command snapshot consumed by the actuation thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub lift_speed: i32,
    pub lateral1_speed: i32,
    pub lateral2_speed: i32,
    pub auto_control_active: bool,
}

impl MotorCommand {
    /// Command produced by the altitude controller: lift only, lateral motors idle.
    pub fn auto(lift: i32, limits: &MotorLimits) -> Self {
        Self {
            lift_speed: limits.lift.clamp(lift),
            lateral1_speed: 0,
            lateral2_speed: 0,
            auto_control_active: true,
        }
    }

    /// Manual override; the altitude controller must not touch the motors while this holds.
    pub fn manual(lift: i32, lateral1: i32, lateral2: i32, limits: &MotorLimits) -> Self {
        Self {
            lift_speed: limits.lift.clamp(lift),
            lateral1_speed: limits.lateral.clamp(lateral1),
            lateral2_speed: limits.lateral.clamp(lateral2),
            auto_control_active: false,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.lift_speed == 0 && self.lateral1_speed == 0 && self.lateral2_speed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_uses_age_against_threshold() {
        let s = SensorSnapshot {
            last_read_ms: 1_000,
            filtered_altitude: 12.0,
            ..Default::default()
        };
        assert_eq!(s.age_ms(1_200), 200);
        assert!(!s.is_stale(1_200, 200));
        assert!(s.is_stale(1_201, 200));
        assert_eq!(s.age_ms(500), 0);
        assert!(s.has_reading());
        assert!(!SensorSnapshot::default().has_reading());

        let sample = AltitudeSample::from(&s);
        assert_eq!(sample.age_ms(1_200), s.age_ms(1_200));
        assert!(sample.is_stale(1_201, 200));
    }

    #[test]
    fn commands_are_clamped_per_channel() {
        let limits = MotorLimits {
            lift: ChannelRange { min: -40, max: 80 },
            lateral: ChannelRange { min: -60, max: 60 },
        };
        let auto = MotorCommand::auto(95, &limits);
        assert_eq!(auto.lift_speed, 80);
        assert!(auto.auto_control_active);

        let manual = MotorCommand::manual(-100, 100, -100, &limits);
        assert_eq!(
            (manual.lift_speed, manual.lateral1_speed, manual.lateral2_speed),
            (-40, 60, -60)
        );
        assert!(!manual.auto_control_active);
    }

    #[test]
    fn limits_outside_the_actuator_range_are_rejected() {
        let limits = MotorLimits {
            lift: ChannelRange { min: -120, max: 100 },
            ..Default::default()
        };
        assert!(limits.validate().is_err());
        let inverted = MotorLimits {
            lateral: ChannelRange { min: 10, max: -10 },
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
        assert!(MotorLimits::default().validate().is_ok());
    }
}
