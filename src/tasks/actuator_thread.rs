use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

use super::{pace, TaskContext, TaskStats};
use crate::actuator::{resolve_command, MotorDriver};
use crate::hub::MotorCommand;

/// One actuation cycle. Returns what was sent to the driver.
pub fn actuate<D: MotorDriver>(driver: &mut D, ctx: &TaskContext, last_known: MotorCommand) -> MotorCommand {
    TaskStats::bump(&ctx.stats.actuation_cycles);
    let queued = ctx.hub.motor_commands.drain().pop();

    let lock_start = Instant::now();
    let snapshot = ctx.hub.try_read_motor_command();
    ctx.metrics.record_lock_wait(lock_start.elapsed());

    let command = resolve_command(snapshot, queued, last_known);
    driver.drive(&command);
    command
}

/// Drives the motors at `run.actuation_interval_ms` until shutdown, then
/// leaves them neutral.
pub fn spawn_actuator_thread<D>(mut driver: D, ctx: TaskContext) -> thread::JoinHandle<()>
where
    D: MotorDriver + 'static,
{
    thread::spawn(move || {
        let mut last_known = MotorCommand::default();
        info!("[ACTUATOR] thread started");

        while !ctx.stats.is_shutdown() {
            let cycle_start = Instant::now();
            last_known = actuate(&mut driver, &ctx, last_known);
            let interval = Duration::from_millis(ctx.config.read(|c| c.run.actuation_interval_ms));
            pace(cycle_start, interval, &ctx.stats);
        }

        driver.drive(&MotorCommand::default());
        if !last_known.is_neutral() {
            warn!("[ACTUATOR] motors were running at shutdown, forced to neutral");
        }
        info!("[ACTUATOR] thread stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RecordingDriver;
    use crate::clock::ControlClock;
    use crate::config::ConfigBuffer;
    use crate::hub::{HubSettings, MotorLimits, SharedStateHub};

    fn context() -> TaskContext {
        let hub = SharedStateHub::new(&HubSettings::default());
        TaskContext::new(hub, ConfigBuffer::default(), ControlClock::new())
    }

    #[test]
    fn drives_the_hub_snapshot_and_empties_the_queue() {
        let ctx = context();
        let limits = MotorLimits::default();
        ctx.hub.motor_commands.try_send(MotorCommand::auto(10, &limits)).unwrap();
        let current = MotorCommand::auto(30, &limits);
        ctx.hub.write_motor_command(current).unwrap();

        let mut driver = RecordingDriver::default();
        let sent = actuate(&mut driver, &ctx, MotorCommand::default());
        assert_eq!(sent, current);
        assert!(ctx.hub.motor_commands.is_empty());
        assert_eq!(driver.last(), Some(current));
    }

    #[test]
    fn thread_ends_with_neutral_motors() {
        let ctx = context();
        let limits = MotorLimits::default();
        ctx.hub.write_motor_command(MotorCommand::auto(50, &limits)).unwrap();
        let driver = RecordingDriver::default();
        let handle = spawn_actuator_thread(driver.clone(), ctx.clone());

        thread::sleep(Duration::from_millis(60));
        ctx.stats.request_shutdown();
        handle.join().unwrap();

        let commands = driver.commands();
        assert!(commands.iter().any(|c| c.lift_speed == 50));
        assert_eq!(commands.last(), Some(&MotorCommand::default()));
    }
}
