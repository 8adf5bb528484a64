//! Calibrated altitude-hold PID controller.
//!
//! The controller holds a reference altitude captured at calibration time and
//! drives the measured altitude toward `target` metres above (or below) it.
//! It knows nothing about threads or locks: the control thread owns it and
//! serializes every call.
//!
//! ```no_run
//! # use altitude_hold::control::AltitudeController;
//! let mut pid = AltitudeController::new(2.0, 0.1, 1.0, 100);
//! pid.calibrate_initial_value(102.4).ok();
//! pid.set_target_value(5.0);
//! pid.enable();
//! let lift = pid.compute(103.1);
//! ```

use log::{info, warn};

use super::diagnostics::{ControlDiagnostic, DiagnosticSink, LogSink};
use super::settings::{validate_gain, ControllerSettings};
use super::OUTPUT_LIMIT;
use crate::clock::ControlClock;
use crate::error::{ControlError, ControlResult};

pub struct AltitudeController {
    // Gains
    kp: f32,
    ki: f32,
    kd: f32,

    // Loop memory
    error_sum: f32,
    last_error: f32,
    last_update_ms: u64,

    // Reference and setpoint (metres)
    target_value: f32,
    initial_value: f32,
    is_initialized: bool,
    is_enabled: bool,

    update_interval_ms: u32,
    error_sum_limit: f32,
    min_elapsed_ms: u64,

    clock: ControlClock,
    sink: Box<dyn DiagnosticSink + Send>,
    last_diagnostic: Option<ControlDiagnostic>,
}

impl AltitudeController {
    pub fn new(kp: f32, ki: f32, kd: f32, update_interval_ms: u32) -> Self {
        let defaults = ControllerSettings::default();
        let clock = ControlClock::new();
        Self {
            kp,
            ki,
            kd,
            error_sum: 0.0,
            last_error: 0.0,
            last_update_ms: clock.now_ms(),
            target_value: 0.0,
            initial_value: 0.0,
            is_initialized: false,
            is_enabled: false,
            update_interval_ms,
            error_sum_limit: defaults.error_sum_limit,
            min_elapsed_ms: defaults.min_elapsed_ms,
            clock,
            sink: Box::new(LogSink),
            last_diagnostic: None,
        }
    }

    /// Build from validated settings.
    pub fn from_settings(settings: &ControllerSettings) -> ControlResult<Self> {
        let mut controller = Self::default();
        controller.apply(settings)?;
        Ok(controller)
    }

    /// Swap the time base, e.g. for a mocked clock. Rebases the update clock.
    pub fn with_clock(mut self, clock: ControlClock) -> Self {
        self.last_update_ms = clock.now_ms();
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: impl DiagnosticSink + Send + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    // ---- configuration -------------------------------------------------------

    pub fn set_tunings(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Validate gains first, then set them. Invalid input leaves the gains untouched.
    pub fn try_set_tunings(&mut self, kp: f32, ki: f32, kd: f32) -> ControlResult<()> {
        validate_gain("kp", kp)?;
        validate_gain("ki", ki)?;
        validate_gain("kd", kd)?;
        self.set_tunings(kp, ki, kd);
        Ok(())
    }

    pub fn set_interval(&mut self, interval_ms: u32) {
        self.update_interval_ms = interval_ms;
    }

    pub fn set_error_sum_limit(&mut self, limit: f32) {
        self.error_sum_limit = limit;
        self.error_sum = clamp_symmetric(self.error_sum, limit);
    }

    pub fn set_min_elapsed_ms(&mut self, min_elapsed_ms: u64) {
        self.min_elapsed_ms = min_elapsed_ms;
    }

    pub fn set_kp(&mut self, kp: f32) {
        self.kp = kp;
    }

    pub fn set_ki(&mut self, ki: f32) {
        self.ki = ki;
    }

    pub fn set_kd(&mut self, kd: f32) {
        self.kd = kd;
    }

    /// Apply a whole settings bundle. Nothing changes unless all of it is valid.
    pub fn apply(&mut self, settings: &ControllerSettings) -> ControlResult<()> {
        settings.validate()?;
        self.set_tunings(settings.kp, settings.ki, settings.kd);
        self.set_interval(settings.update_interval_ms);
        self.set_error_sum_limit(settings.error_sum_limit);
        self.set_min_elapsed_ms(settings.min_elapsed_ms);
        Ok(())
    }

    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            update_interval_ms: self.update_interval_ms,
            error_sum_limit: self.error_sum_limit,
            min_elapsed_ms: self.min_elapsed_ms,
        }
    }

    // ---- control -------------------------------------------------------------

    /// Capture `current_value` as the reference altitude.
    ///
    /// `0.0` means the sensor has not produced a reading yet; such a call is
    /// rejected and the previous calibration is kept.
    pub fn calibrate_initial_value(&mut self, current_value: f32) -> ControlResult<()> {
        if current_value == 0.0 || !current_value.is_finite() {
            warn!("Cannot calibrate: invalid sensor data ({current_value})");
            return Err(ControlError::InvalidCalibration(current_value));
        }
        self.initial_value = current_value;
        self.is_initialized = true;
        self.target_value = 0.0;
        self.reset();
        info!("Initial value calibrated to: {:.2} m", self.initial_value);
        Ok(())
    }

    pub fn set_initial_value(&mut self, value: f32) -> ControlResult<()> {
        self.calibrate_initial_value(value)
    }

    /// Set the desired offset from the reference. Clears the integral term so a
    /// setpoint jump does not inherit accumulated error.
    pub fn set_target_value(&mut self, target: f32) {
        self.target_value = target;
        self.error_sum = 0.0;
        info!("Target value set to: {:.2} m (relative to initial height)", target);
    }

    pub fn enable(&mut self) {
        self.is_enabled = true;
        self.last_update_ms = self.clock.now_ms();
        info!("PID controller enabled");
    }

    pub fn disable(&mut self) {
        self.is_enabled = false;
        info!("PID controller disabled");
    }

    pub fn activate(&mut self, state: bool) {
        if state {
            self.enable();
        } else {
            self.disable();
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_enabled && self.is_initialized
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    /// Clear integral and derivative memory and rebase the clock.
    pub fn reset(&mut self) {
        self.error_sum = 0.0;
        self.last_error = 0.0;
        self.last_update_ms = self.clock.now_ms();
    }

    /// One control step. Returns the lift command in `[-100, 100]`, or `0` when
    /// called again before the minimum interval has elapsed.
    pub fn compute(&mut self, current_value: f32) -> i32 {
        self.try_compute(current_value).unwrap_or(0)
    }

    /// Like [`compute`](Self::compute) but distinguishes a skipped step (`None`)
    /// from a genuine zero output.
    pub fn try_compute(&mut self, current_value: f32) -> Option<i32> {
        let now_ms = self.clock.now_ms();
        let elapsed_ms = now_ms.saturating_sub(self.last_update_ms);
        if elapsed_ms < self.min_elapsed_ms {
            return None;
        }
        let dt = elapsed_ms as f32 / 1000.0;

        let relative = current_value - self.initial_value;
        let error = self.target_value - relative;

        self.error_sum = clamp_symmetric(self.error_sum + error * dt, self.error_sum_limit);

        let d_error = (error - self.last_error) / dt;

        let output = self.kp * error + self.ki * self.error_sum + self.kd * d_error;

        self.last_error = error;
        self.last_update_ms = now_ms;

        // `as` truncates toward zero and maps NaN to 0
        let command = output.clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT) as i32;

        let diagnostic = ControlDiagnostic {
            timestamp_ms: now_ms,
            target: self.target_value,
            relative,
            error,
            output: command,
        };
        self.sink.record(&diagnostic);
        self.last_diagnostic = Some(diagnostic);

        Some(command)
    }

    // ---- status --------------------------------------------------------------

    pub fn target(&self) -> f32 {
        self.target_value
    }

    pub fn initial_value(&self) -> f32 {
        self.initial_value
    }

    pub fn is_initial_value_set(&self) -> bool {
        self.is_initialized
    }

    pub fn current_relative(&self, current_value: f32) -> f32 {
        current_value - self.initial_value
    }

    pub fn kp(&self) -> f32 {
        self.kp
    }

    pub fn ki(&self) -> f32 {
        self.ki
    }

    pub fn kd(&self) -> f32 {
        self.kd
    }

    pub fn update_interval_ms(&self) -> u32 {
        self.update_interval_ms
    }

    pub fn error_sum(&self) -> f32 {
        self.error_sum
    }

    pub fn error_sum_limit(&self) -> f32 {
        self.error_sum_limit
    }

    pub fn last_error(&self) -> f32 {
        self.last_error
    }

    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    pub fn last_diagnostic(&self) -> Option<ControlDiagnostic> {
        self.last_diagnostic
    }
}

impl Default for AltitudeController {
    fn default() -> Self {
        let s = ControllerSettings::default();
        Self::new(s.kp, s.ki, s.kd, s.update_interval_ms)
    }
}

/// A non-positive or NaN limit collapses the accumulator to zero instead of panicking.
fn clamp_symmetric(value: f32, limit: f32) -> f32 {
    if !(limit > 0.0) {
        return 0.0;
    }
    value.clamp(-limit, limit)
}
