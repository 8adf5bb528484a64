//! Actuator module - boundary to the motor drivers

use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::hub::MotorCommand;

/// Boundary to the ESC / H-bridge layer.
pub trait MotorDriver: Send {
    fn drive(&mut self, command: &MotorCommand);
}

/// Pick what actually reaches the motors.
///
/// The hub snapshot is authoritative. When its lock was busy, the newest queued
/// command is used instead, except that a queued auto command never takes the
/// motors back from a manual override. With neither, the last command holds.
pub fn resolve_command(
    snapshot: Option<MotorCommand>,
    queued: Option<MotorCommand>,
    last_known: MotorCommand,
) -> MotorCommand {
    match (snapshot, queued) {
        (Some(current), _) => current,
        (None, Some(cmd)) if !cmd.auto_control_active || last_known.auto_control_active => cmd,
        _ => last_known,
    }
}

/// Logs every change of command.
#[derive(Default)]
pub struct LoggingDriver {
    last: Option<MotorCommand>,
}

impl MotorDriver for LoggingDriver {
    fn drive(&mut self, command: &MotorCommand) {
        if self.last.as_ref() == Some(command) {
            return;
        }
        let mode = if command.auto_control_active { "auto" } else { "manual" };
        if self.last.map(|c| c.auto_control_active) != Some(command.auto_control_active) {
            info!("[ACTUATOR] motors now in {mode} mode");
        }
        debug!(
            "[ACTUATOR] lift={} lateral1={} lateral2={} ({mode})",
            command.lift_speed, command.lateral1_speed, command.lateral2_speed
        );
        self.last = Some(*command);
    }
}

/// Keeps every command it receives; cloning shares the record.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    commands: Arc<Mutex<Vec<MotorCommand>>>,
}

impl RecordingDriver {
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.commands.lock().clone()
    }

    pub fn last(&self) -> Option<MotorCommand> {
        self.commands.lock().last().copied()
    }
}

impl MotorDriver for RecordingDriver {
    fn drive(&mut self, command: &MotorCommand) {
        self.commands.lock().push(*command);
    }
}

impl<A: MotorDriver, B: MotorDriver> MotorDriver for (A, B) {
    fn drive(&mut self, command: &MotorCommand) {
        self.0.drive(command);
        self.1.drive(command);
    }
}
