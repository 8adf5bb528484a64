use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

use super::{pace, TaskContext, TaskStats};
use crate::hub::{AltitudeSample, Delivery, SensorSnapshot};
use crate::sensor::{AltitudeFilter, AltitudeSource, RawReading};

/// One sensor cycle at a time: read, filter, publish.
pub struct SensorLoop<S: AltitudeSource> {
    source: S,
    filter: AltitudeFilter,
    ctx: TaskContext,
    last_read_ms: u64,
}

impl<S: AltitudeSource> SensorLoop<S> {
    pub fn new(source: S, ctx: TaskContext) -> Self {
        let window = ctx.config.read(|c| c.sensor.filter_window);
        Self {
            source,
            filter: AltitudeFilter::new(window),
            ctx,
            last_read_ms: 0,
        }
    }

    /// Returns the snapshot that was published, or `None` on a dropout.
    pub fn cycle(&mut self) -> Option<SensorSnapshot> {
        let stats = &self.ctx.stats;
        TaskStats::bump(&stats.sensor_cycles);

        let reading = match self.source.read() {
            Some(r) if is_usable(&r) => r,
            _ => {
                TaskStats::bump(&stats.sensor_dropouts);
                return None;
            }
        };

        let filtered = self.filter.push(reading.altitude);
        // a reading timestamp never precedes the previous one
        let now_ms = self.ctx.clock.now_ms().max(self.last_read_ms);
        let snapshot = SensorSnapshot {
            temperature: reading.temperature,
            pressure: reading.pressure,
            raw_altitude: reading.altitude,
            filtered_altitude: filtered,
            last_read_ms: now_ms,
        };

        let lock_start = Instant::now();
        let written = self.ctx.hub.write_sensor_snapshot(snapshot);
        self.ctx.metrics.record_lock_wait(lock_start.elapsed());
        if let Err(e) = written {
            TaskStats::bump(&stats.snapshot_write_failures);
            warn!("[SENSOR] snapshot not stored: {e}");
        }
        self.last_read_ms = now_ms;

        match self.ctx.hub.altitude_samples.try_send(AltitudeSample::from(&snapshot)) {
            Ok(Delivery::DisplacedOldest) => TaskStats::bump(&stats.samples_displaced),
            Ok(Delivery::Delivered) => {}
            Err(_) => TaskStats::bump(&stats.samples_displaced),
        }

        Some(snapshot)
    }
}

/// A zero altitude is how the barometer reports "no data".
fn is_usable(reading: &RawReading) -> bool {
    reading.altitude.is_finite() && reading.altitude != 0.0 && reading.pressure.is_finite()
}

pub fn spawn_sensor_thread<S>(source: S, ctx: TaskContext) -> thread::JoinHandle<()>
where
    S: AltitudeSource + 'static,
{
    thread::spawn(move || {
        let stats = ctx.stats.clone();
        let config = ctx.config.clone();
        let mut sensor = SensorLoop::new(source, ctx);
        info!("[SENSOR] thread started");

        while !stats.is_shutdown() {
            let cycle_start = Instant::now();
            sensor.cycle();
            let interval = Duration::from_millis(config.read(|c| c.sensor.interval_ms));
            pace(cycle_start, interval, &stats);
        }
        info!("[SENSOR] thread stopped");
    })
}
