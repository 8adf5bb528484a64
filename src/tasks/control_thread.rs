use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

use super::{pace, TaskContext, TaskStats};
use crate::command::RemoteCommand;
use crate::control::AltitudeController;
use crate::error::{ConfigError, ConfigResult};
use crate::hub::{AltitudeSample, MotorCommand, MotorLimits};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlLoopSettings {
    /// How long a cycle waits for a fresh sample before using the hub snapshot.
    pub sample_timeout_ms: u64,
    /// Capture the reference altitude from the first valid sample.
    pub auto_calibrate: bool,
    /// Enable the controller once it is calibrated, unless an operator disabled it.
    pub auto_enable: bool,
}

impl Default for ControlLoopSettings {
    fn default() -> Self {
        Self {
            sample_timeout_ms: 50,
            auto_calibrate: true,
            auto_enable: true,
        }
    }
}

impl ControlLoopSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sample_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "control_loop.sample_timeout_ms",
                reason: "must be at least 1 ms".to_string(),
            });
        }
        Ok(())
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }
}

/// Why a cycle left the motors alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    ManualOverride,
    NoSample,
    StaleSample,
    Inactive,
    TooSoon,
    HubBusy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Commanded(MotorCommand),
    Held(HoldReason),
}

/// Owns the controller and runs one control cycle at a time.
pub struct ControlLoop {
    controller: AltitudeController,
    ctx: TaskContext,
    settings: ControlLoopSettings,
    limits: MotorLimits,
    staleness_ms: u64,
    last_sample: Option<AltitudeSample>,
    manual: bool,
    auto_enable_pending: bool,
    last_hold: Option<HoldReason>,
}

impl ControlLoop {
    pub fn new(controller: AltitudeController, ctx: TaskContext) -> Self {
        let config = ctx.config.get();
        Self {
            controller,
            settings: config.control_loop,
            limits: config.motor,
            staleness_ms: ctx.hub.settings().staleness_ms,
            ctx,
            last_sample: None,
            manual: false,
            auto_enable_pending: config.control_loop.auto_enable,
            last_hold: None,
        }
    }

    pub fn controller(&self) -> &AltitudeController {
        &self.controller
    }

    pub fn into_controller(self) -> AltitudeController {
        self.controller
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    pub fn cycle(&mut self) -> CycleOutcome {
        TaskStats::bump(&self.ctx.stats.control_cycles);

        for command in self.ctx.hub.remote_commands.drain() {
            TaskStats::bump(&self.ctx.stats.remote_commands);
            self.handle_command(command);
        }

        let outcome = self.step();
        if let CycleOutcome::Held(reason) = outcome {
            if self.last_hold != Some(reason) {
                debug!("[CONTROL] holding: {reason:?}");
            }
            self.last_hold = Some(reason);
        } else {
            self.last_hold = None;
        }
        outcome
    }

    fn step(&mut self) -> CycleOutcome {
        if self.manual {
            return CycleOutcome::Held(HoldReason::ManualOverride);
        }

        let sample = match self.next_sample() {
            Ok(sample) => sample,
            Err(reason) => return CycleOutcome::Held(reason),
        };
        self.last_sample = Some(sample);

        let now_ms = self.ctx.clock.now_ms();
        self.ctx.metrics.record_sample_age(sample.age_ms(now_ms));
        if sample.is_stale(now_ms, self.staleness_ms) {
            TaskStats::bump(&self.ctx.stats.stale_samples);
            return CycleOutcome::Held(HoldReason::StaleSample);
        }

        if !self.controller.is_initial_value_set() && self.settings.auto_calibrate {
            // a zero reading is refused and retried next cycle
            let _ = self.controller.calibrate_initial_value(sample.altitude);
        }
        if self.auto_enable_pending && self.controller.is_initial_value_set() {
            self.controller.enable();
            self.auto_enable_pending = false;
        }
        if !self.controller.is_active() {
            return CycleOutcome::Held(HoldReason::Inactive);
        }

        let compute_start = Instant::now();
        let output = self.controller.try_compute(sample.altitude);
        self.ctx.metrics.record_compute(compute_start.elapsed());
        let Some(lift) = output else {
            TaskStats::bump(&self.ctx.stats.skipped_cycles);
            return CycleOutcome::Held(HoldReason::TooSoon);
        };

        let command = MotorCommand::auto(lift, &self.limits);
        self.publish(command);
        CycleOutcome::Commanded(command)
    }

    /// Newest queued sample, else the hub snapshot if it is newer than what we
    /// had, else the last sample we used.
    fn next_sample(&mut self) -> Result<AltitudeSample, HoldReason> {
        if let Some(sample) = self
            .ctx
            .hub
            .altitude_samples
            .recv_latest(self.settings.sample_timeout())
        {
            return Ok(sample);
        }

        let lock_start = Instant::now();
        let snapshot = self.ctx.hub.read_sensor_snapshot();
        self.ctx.metrics.record_lock_wait(lock_start.elapsed());

        match snapshot {
            Ok(s)
                if s.has_reading()
                    && self.last_sample.map_or(true, |l| s.last_read_ms > l.timestamp_ms) =>
            {
                Ok(AltitudeSample::from(&s))
            }
            Ok(_) => self.last_sample.ok_or(HoldReason::NoSample),
            Err(e) => {
                TaskStats::bump(&self.ctx.stats.hub_failures);
                debug!("[CONTROL] sensor snapshot unavailable: {e}");
                self.last_sample.ok_or(HoldReason::HubBusy)
            }
        }
    }

    fn publish(&self, command: MotorCommand) {
        match self.ctx.hub.write_motor_command(command) {
            Ok(()) => TaskStats::bump(&self.ctx.stats.commands_written),
            Err(e) => {
                TaskStats::bump(&self.ctx.stats.hub_failures);
                warn!("[CONTROL] motor command not stored: {e}");
            }
        }
        if self.ctx.hub.motor_commands.try_send(command).is_err() {
            debug!("[CONTROL] motor-command queue full, actuation reads the snapshot");
        }
    }

    pub fn handle_command(&mut self, command: RemoteCommand) {
        info!("[CONTROL] remote command: {command}");
        match command {
            RemoteCommand::SetTarget { value } => {
                if value.is_finite() {
                    self.controller.set_target_value(value);
                } else {
                    warn!("[CONTROL] ignoring non-finite target {value}");
                }
            }
            RemoteCommand::SetGains { kp, ki, kd } => match self.controller.try_set_tunings(kp, ki, kd) {
                Ok(()) => self
                    .ctx
                    .config
                    .update(|c| c.controller = c.controller.with_gains(kp, ki, kd)),
                Err(e) => warn!("[CONTROL] gains rejected: {e}"),
            },
            RemoteCommand::Enable => {
                self.controller.enable();
                if !self.controller.is_initial_value_set() {
                    warn!("[CONTROL] enabled before calibration, output stays neutral");
                }
            }
            RemoteCommand::Disable => {
                self.controller.disable();
                self.auto_enable_pending = false;
                if !self.manual {
                    self.publish(MotorCommand::auto(0, &self.limits));
                }
            }
            RemoteCommand::Calibrate => {
                let sample = self.last_sample.or_else(|| {
                    self.ctx
                        .hub
                        .try_read_sensor_snapshot()
                        .map(|s| AltitudeSample::from(&s))
                });
                let now_ms = self.ctx.clock.now_ms();
                match sample {
                    Some(s) if s.is_stale(now_ms, self.staleness_ms) => warn!(
                        "[CONTROL] refusing to calibrate from a sample {} ms old",
                        s.age_ms(now_ms)
                    ),
                    Some(s) => {
                        if let Err(e) = self.controller.calibrate_initial_value(s.altitude) {
                            warn!("[CONTROL] {e}");
                        }
                    }
                    None => warn!("[CONTROL] no sample to calibrate from"),
                }
            }
            RemoteCommand::Manual {
                lift,
                lateral1,
                lateral2,
            } => {
                if !self.manual {
                    info!("[CONTROL] manual override engaged");
                }
                self.manual = true;
                self.publish(MotorCommand::manual(lift, lateral1, lateral2, &self.limits));
            }
            RemoteCommand::Auto => {
                if self.manual {
                    info!("[CONTROL] manual override released");
                }
                self.manual = false;
                self.controller.reset();
                self.publish(MotorCommand::auto(0, &self.limits));
            }
        }
    }
}

/// Runs the control loop at the controller's update interval. The controller is
/// handed back when the thread exits.
pub fn spawn_control_thread(
    controller: AltitudeController,
    ctx: TaskContext,
) -> thread::JoinHandle<AltitudeController> {
    thread::spawn(move || {
        let stats = ctx.stats.clone();
        let metrics = ctx.metrics.clone();
        let config = ctx.config.clone();
        let mut control = ControlLoop::new(controller, ctx);
        let mut previous_start: Option<Instant> = None;
        info!("[CONTROL] thread started");

        while !stats.is_shutdown() {
            let cycle_start = Instant::now();
            if let Some(prev) = previous_start {
                metrics.record_cycle(cycle_start - prev);
            }
            previous_start = Some(cycle_start);

            control.cycle();

            let interval = Duration::from_millis(config.read(|c| u64::from(c.controller.update_interval_ms)));
            pace(cycle_start, interval, &stats);
        }
        info!("[CONTROL] thread stopped");
        control.into_controller()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ControlClock, ControlClockMock};
    use crate::config::ConfigBuffer;
    use crate::control::NullSink;
    use crate::hub::{HubSettings, SensorSnapshot, SharedStateHub};

    fn setup() -> (ControlLoop, TaskContext, ControlClockMock) {
        let (clock, mock) = ControlClock::mock();
        let hub = SharedStateHub::new(&HubSettings::default());
        let mut config = crate::config::RuntimeConfig::default();
        config.control_loop.sample_timeout_ms = 1;
        let ctx = TaskContext::new(hub, ConfigBuffer::new(config), clock.clone());
        let pid = AltitudeController::default()
            .with_clock(clock)
            .with_sink(NullSink);
        (ControlLoop::new(pid, ctx.clone()), ctx, mock)
    }

    fn feed(ctx: &TaskContext, altitude: f32) {
        let sample = AltitudeSample {
            altitude,
            timestamp_ms: ctx.clock.now_ms(),
        };
        ctx.hub.altitude_samples.try_send(sample).unwrap();
    }

    #[test]
    fn first_sample_calibrates_and_enables() {
        let (mut control, ctx, mock) = setup();
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::NoSample));

        mock.advance_ms(100);
        feed(&ctx, 100.0);
        // calibration rebases the clock, so the first compute lands inside the guard
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::TooSoon));
        assert!(control.controller().is_active());
        assert_eq!(control.controller().initial_value(), 100.0);

        ctx.hub.remote_commands.try_send(RemoteCommand::SetTarget { value: 5.0 }).unwrap();
        mock.advance_ms(100);
        feed(&ctx, 100.0);
        let expected = MotorCommand::auto(60, &MotorLimits::default());
        assert_eq!(control.cycle(), CycleOutcome::Commanded(expected));
        assert_eq!(ctx.hub.read_motor_command().unwrap(), expected);
        assert_eq!(ctx.hub.motor_commands.try_recv(), Some(expected));
    }

    #[test]
    fn stale_samples_are_not_fed_to_the_controller() {
        let (mut control, ctx, mock) = setup();
        feed(&ctx, 50.0);
        control.cycle();
        mock.advance_ms(600);
        // no new sample: the last one is reused and is now too old
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::StaleSample));
        assert_eq!(TaskStats::get(&ctx.stats.stale_samples), 1);
        assert_eq!(control.controller().last_error(), 0.0);
    }

    #[test]
    fn falls_back_to_the_hub_snapshot() {
        let (mut control, ctx, mock) = setup();
        mock.advance_ms(20);
        ctx.hub
            .write_sensor_snapshot(SensorSnapshot {
                filtered_altitude: 80.0,
                raw_altitude: 80.0,
                last_read_ms: 20,
                ..Default::default()
            })
            .unwrap();
        control.cycle();
        assert_eq!(control.controller().initial_value(), 80.0);
    }

    #[test]
    fn manual_override_keeps_the_controller_off_the_motors() {
        let (mut control, ctx, mock) = setup();
        feed(&ctx, 100.0);
        control.cycle();

        ctx.hub.remote_commands.try_send(RemoteCommand::forward()).unwrap();
        mock.advance_ms(100);
        feed(&ctx, 90.0);
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::ManualOverride));
        let cmd = ctx.hub.read_motor_command().unwrap();
        assert!(!cmd.auto_control_active);
        assert_eq!(cmd.lateral1_speed, crate::command::MANUAL_DRIVE_SPEED);

        ctx.hub.remote_commands.try_send(RemoteCommand::Auto).unwrap();
        mock.advance_ms(100);
        feed(&ctx, 90.0);
        control.cycle();
        assert!(!control.is_manual());
        assert!(ctx.hub.read_motor_command().unwrap().auto_control_active);
    }

    #[test]
    fn disable_sticks_and_neutralizes_lift() {
        let (mut control, ctx, mock) = setup();
        feed(&ctx, 100.0);
        control.cycle();
        ctx.hub.remote_commands.try_send(RemoteCommand::Disable).unwrap();
        mock.advance_ms(100);
        feed(&ctx, 90.0);
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::Inactive));
        let cmd = ctx.hub.read_motor_command().unwrap();
        assert!(cmd.auto_control_active && cmd.is_neutral());

        mock.advance_ms(100);
        feed(&ctx, 90.0);
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::Inactive));
    }

    #[test]
    fn calibrate_refuses_a_stale_sample() {
        let (_, ctx, mock) = setup();
        ctx.config.update(|c| c.control_loop.auto_calibrate = false);
        let pid = AltitudeController::default()
            .with_clock(ctx.clock.clone())
            .with_sink(NullSink);
        let mut control = ControlLoop::new(pid, ctx.clone());

        feed(&ctx, 100.0);
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::Inactive));
        mock.advance_ms(10_000);
        assert_eq!(control.cycle(), CycleOutcome::Held(HoldReason::StaleSample));

        control.handle_command(RemoteCommand::Calibrate);
        assert!(!control.controller().is_initial_value_set());

        feed(&ctx, 104.0);
        control.cycle();
        control.handle_command(RemoteCommand::Calibrate);
        assert_eq!(control.controller().initial_value(), 104.0);
    }

    #[test]
    fn bad_remote_values_are_ignored() {
        let (mut control, ctx, _mock) = setup();
        control.handle_command(RemoteCommand::SetTarget { value: f32::NAN });
        assert_eq!(control.controller().target(), 0.0);
        control.handle_command(RemoteCommand::SetGains {
            kp: -1.0,
            ki: 0.0,
            kd: 0.0,
        });
        assert_eq!(control.controller().kp(), 2.0);

        control.handle_command(RemoteCommand::SetGains {
            kp: 4.0,
            ki: 0.2,
            kd: 0.5,
        });
        assert_eq!(control.controller().kp(), 4.0);
        assert_eq!(ctx.config.get().controller.kp, 4.0);
    }

    #[test]
    fn settings_reject_zero_timeout() {
        let s = ControlLoopSettings {
            sample_timeout_ms: 0,
            ..Default::default()
        };
        assert!(s.validate().is_err());
        assert!(ControlLoopSettings::default().validate().is_ok());
    }
}
