//! Hub module - the only path for data shared between threads
//!
//! The hub owns the canonical [`SensorSnapshot`] and [`MotorCommand`], each behind
//! its own lock, plus three bounded channels:
//!
//! | channel | direction | overflow |
//! | ------- | --------- | -------- |
//! | `altitude_samples` | sensor → control | keep latest |
//! | `motor_commands` | control → actuation | reject newest |
//! | `remote_commands` | network → control | block with timeout |
//!
//! No hub operation ever holds the sensor and motor locks at the same time.

pub mod channels;
pub mod shared_state;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::command::RemoteCommand;
use crate::error::{ConfigError, ConfigResult, HubError, HubResult};

pub use channels::{Channel, Delivery, OverflowPolicy};
pub use shared_state::{Freshness, FreshnessMonitor, Guarded, LockPolicy};
pub use snapshot::{AltitudeSample, ChannelRange, MotorCommand, MotorLimits, SensorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    pub sample_capacity: usize,
    pub motor_capacity: usize,
    pub remote_capacity: usize,
    pub lock_timeout_ms: u64,
    pub lock_attempts: u32,
    /// Samples older than this are not fed to the controller.
    pub staleness_ms: u64,
    /// Per-attempt wait of the network thread when the remote channel is full.
    pub remote_send_timeout_ms: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            sample_capacity: 4,
            motor_capacity: 8,
            remote_capacity: 16,
            lock_timeout_ms: 5,
            lock_attempts: 3,
            staleness_ms: 500,
            remote_send_timeout_ms: 100,
        }
    }
}

impl HubSettings {
    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            attempt_timeout: Duration::from_millis(self.lock_timeout_ms),
            max_attempts: self.lock_attempts,
        }
    }

    pub fn remote_send_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_send_timeout_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let capacities = [
            ("hub.sample_capacity", self.sample_capacity),
            ("hub.motor_capacity", self.motor_capacity),
            ("hub.remote_capacity", self.remote_capacity),
        ];
        for (field, capacity) in capacities {
            if capacity == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "channels need room for at least one item".to_string(),
                });
            }
        }
        if self.lock_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "hub.lock_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.staleness_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "hub.staleness_ms",
                reason: "must be at least 1 ms".to_string(),
            });
        }
        Ok(())
    }
}

/// Created once at startup and cloned into every thread.
#[derive(Clone)]
pub struct SharedStateHub {
    sensor: Guarded<SensorSnapshot>,
    motor: Guarded<MotorCommand>,
    pub altitude_samples: Channel<AltitudeSample>,
    pub motor_commands: Channel<MotorCommand>,
    pub remote_commands: Channel<RemoteCommand>,
    settings: HubSettings,
}

impl SharedStateHub {
    pub fn new(settings: &HubSettings) -> Self {
        let policy = settings.lock_policy();
        Self {
            sensor: Guarded::new("sensor", SensorSnapshot::default(), policy),
            motor: Guarded::new("motor", MotorCommand::default(), policy),
            altitude_samples: Channel::new(
                "altitude",
                settings.sample_capacity,
                OverflowPolicy::KeepLatest,
            ),
            motor_commands: Channel::new(
                "motor-command",
                settings.motor_capacity,
                OverflowPolicy::RejectNewest,
            ),
            remote_commands: Channel::new(
                "remote-command",
                settings.remote_capacity,
                OverflowPolicy::Block,
            ),
            settings: *settings,
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub fn read_sensor_snapshot(&self) -> HubResult<SensorSnapshot> {
        self.sensor.read()
    }

    pub fn try_read_sensor_snapshot(&self) -> Option<SensorSnapshot> {
        self.sensor.try_read()
    }

    /// Replace the sensor snapshot as a whole. A snapshot older than the current
    /// one is refused so `last_read_ms` never goes backwards.
    pub fn write_sensor_snapshot(&self, snapshot: SensorSnapshot) -> HubResult<()> {
        self.sensor.update(|current| {
            if snapshot.last_read_ms < current.last_read_ms {
                return Err(HubError::TimestampRegression {
                    current_ms: current.last_read_ms,
                    incoming_ms: snapshot.last_read_ms,
                });
            }
            *current = snapshot;
            Ok(())
        })?
    }

    pub fn read_motor_command(&self) -> HubResult<MotorCommand> {
        self.motor.read()
    }

    pub fn try_read_motor_command(&self) -> Option<MotorCommand> {
        self.motor.try_read()
    }

    pub fn write_motor_command(&self, command: MotorCommand) -> HubResult<()> {
        self.motor.write(command)
    }

    /// `Degraded` while either resource is.
    pub fn freshness(&self) -> Freshness {
        match (self.sensor.freshness(), self.motor.freshness()) {
            (Freshness::Fresh, Freshness::Fresh) => Freshness::Fresh,
            _ => Freshness::Degraded,
        }
    }

    pub fn sensor_freshness(&self) -> Freshness {
        self.sensor.freshness()
    }

    pub fn motor_freshness(&self) -> Freshness {
        self.motor.freshness()
    }

    /// Exhausted lock budgets since startup, both resources together.
    pub fn lock_failures(&self) -> u64 {
        self.sensor.lock_failures() + self.motor.lock_failures()
    }

    #[cfg(test)]
    pub(crate) fn sensor_guard(&self) -> &Guarded<SensorSnapshot> {
        &self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn snapshot(ts: u64, alt: f32) -> SensorSnapshot {
        SensorSnapshot {
            temperature: alt / 10.0,
            pressure: alt * 2.0,
            raw_altitude: alt,
            filtered_altitude: alt,
            last_read_ms: ts,
        }
    }

    #[test]
    fn hub_starts_empty_and_manual() {
        let hub = SharedStateHub::new(&HubSettings::default());
        assert_eq!(hub.read_sensor_snapshot().unwrap(), SensorSnapshot::default());
        let cmd = hub.read_motor_command().unwrap();
        assert!(cmd.is_neutral());
        assert!(!cmd.auto_control_active);
        assert_eq!(hub.freshness(), Freshness::Fresh);
    }

    #[test]
    fn sensor_timestamp_never_goes_backwards() {
        let hub = SharedStateHub::new(&HubSettings::default());
        hub.write_sensor_snapshot(snapshot(100, 10.0)).unwrap();
        hub.write_sensor_snapshot(snapshot(100, 11.0)).unwrap();
        assert_eq!(
            hub.write_sensor_snapshot(snapshot(90, 12.0)),
            Err(HubError::TimestampRegression {
                current_ms: 100,
                incoming_ms: 90
            })
        );
        assert_eq!(hub.read_sensor_snapshot().unwrap().filtered_altitude, 11.0);
    }

    #[test]
    fn busy_sensor_lock_does_not_block_motor_access() {
        let settings = HubSettings {
            lock_timeout_ms: 1,
            lock_attempts: 1,
            ..Default::default()
        };
        let hub = SharedStateHub::new(&settings);
        let _held = hub.sensor_guard().hold_for_test();

        assert_eq!(hub.try_read_sensor_snapshot(), None);
        assert!(matches!(
            hub.read_sensor_snapshot(),
            Err(HubError::LockTimeout { resource: "sensor", .. })
        ));
        assert_eq!(hub.freshness(), Freshness::Degraded);
        assert_eq!(hub.sensor_freshness(), Freshness::Degraded);

        let cmd = MotorCommand::auto(42, &MotorLimits::default());
        hub.write_motor_command(cmd).unwrap();
        assert_eq!(hub.try_read_motor_command(), Some(cmd));
        assert_eq!(hub.motor_freshness(), Freshness::Fresh);
        assert_eq!(hub.freshness(), Freshness::Degraded);
    }

    #[test]
    fn motor_success_does_not_mask_a_degraded_sensor() {
        let settings = HubSettings {
            lock_timeout_ms: 1,
            lock_attempts: 1,
            ..Default::default()
        };
        let hub = SharedStateHub::new(&settings);
        {
            let _held = hub.sensor_guard().hold_for_test();
            assert!(hub.read_sensor_snapshot().is_err());
            hub.read_motor_command().unwrap();
            assert_eq!(hub.sensor_freshness(), Freshness::Degraded);
            assert_eq!(hub.motor_freshness(), Freshness::Fresh);
            assert_eq!(hub.freshness(), Freshness::Degraded);
        }
        assert_eq!(hub.lock_failures(), 1);

        hub.read_sensor_snapshot().unwrap();
        assert_eq!(hub.freshness(), Freshness::Fresh);
    }

    #[test]
    fn concurrent_readers_never_see_torn_snapshots() {
        let hub = SharedStateHub::new(&HubSettings {
            lock_timeout_ms: 50,
            lock_attempts: 100,
            ..Default::default()
        });

        let writers: Vec<_> = (0..3)
            .map(|w| {
                let hub = hub.clone();
                thread::spawn(move || {
                    for i in 1..=2_000u64 {
                        let alt = (w * 10_000 + i) as f32;
                        // regressions between writers are expected and harmless here
                        let _ = hub.write_sensor_snapshot(snapshot(i, alt));
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let hub = hub.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let s = hub.read_sensor_snapshot().unwrap();
                        assert_eq!(s.raw_altitude, s.filtered_altitude);
                        assert_eq!(s.temperature, s.raw_altitude / 10.0);
                        assert_eq!(s.pressure, s.raw_altitude * 2.0);
                        if s.has_reading() {
                            assert_eq!(s.last_read_ms, (s.raw_altitude as u64) % 10_000);
                        }
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
    }

    #[test]
    fn settings_validation_catches_zero_capacity() {
        let bad = HubSettings {
            remote_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::Invalid { field: "hub.remote_capacity", .. })
        ));
        assert!(HubSettings::default().validate().is_ok());
    }
}
