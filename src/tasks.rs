//! Worker threads around the hub: sensor, control, network commands, actuation.
//!
//! Every thread gets a cloned [`TaskContext`] and polls the shared shutdown flag
//! between cycles.

pub mod actuator_thread;
pub mod command_thread;
pub mod control_thread;
pub mod sensor_thread;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::clock::ControlClock;
use crate::config::ConfigBuffer;
use crate::hub::SharedStateHub;
use crate::metrics::TimingMetrics;

pub use actuator_thread::spawn_actuator_thread;
pub use command_thread::spawn_command_thread;
pub use control_thread::{
    spawn_control_thread, ControlLoop, ControlLoopSettings, CycleOutcome, HoldReason,
};
pub use sensor_thread::{spawn_sensor_thread, SensorLoop};

#[derive(Default)]
pub struct TaskStats {
    // sensor
    pub sensor_cycles: AtomicU64,
    pub sensor_dropouts: AtomicU64,
    pub samples_displaced: AtomicU64,
    pub snapshot_write_failures: AtomicU64,
    // control
    pub control_cycles: AtomicU64,
    pub commands_written: AtomicU64,
    pub skipped_cycles: AtomicU64,
    pub stale_samples: AtomicU64,
    pub hub_failures: AtomicU64,
    pub remote_commands: AtomicU64,
    // network
    pub commands_queued: AtomicU64,
    pub rejected_lines: AtomicU64,
    // actuation
    pub actuation_cycles: AtomicU64,
    pub shutdown: AtomicBool,
}

impl TaskStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Everything a worker thread needs, cheap to clone.
#[derive(Clone)]
pub struct TaskContext {
    pub hub: SharedStateHub,
    pub config: ConfigBuffer,
    pub metrics: TimingMetrics,
    pub stats: Arc<TaskStats>,
    pub clock: ControlClock,
}

impl TaskContext {
    pub fn new(hub: SharedStateHub, config: ConfigBuffer, clock: ControlClock) -> Self {
        Self {
            hub,
            config,
            metrics: TimingMetrics::new(),
            stats: TaskStats::new(),
            clock,
        }
    }
}

/// Sleep out the rest of the period, in short slices so shutdown stays responsive.
pub(crate) fn pace(cycle_start: Instant, interval: Duration, stats: &TaskStats) {
    const SLICE: Duration = Duration::from_millis(10);
    let deadline = cycle_start + interval;
    loop {
        let now = Instant::now();
        if now >= deadline || stats.is_shutdown() {
            return;
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_flag_is_shared() {
        let stats = TaskStats::new();
        let other = Arc::clone(&stats);
        assert!(!other.is_shutdown());
        stats.request_shutdown();
        assert!(other.is_shutdown());
    }

    #[test]
    fn pace_returns_early_on_shutdown() {
        let stats = TaskStats::new();
        stats.request_shutdown();
        let start = Instant::now();
        pace(start, Duration::from_secs(5), &stats);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
