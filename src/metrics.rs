//! Metrics module - control loop timing and sample freshness

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn histogram() -> Histogram<u64> {
    Histogram::new(3).expect("3 significant figures is within hdrhistogram's range")
}

#[derive(Clone)]
pub struct TimingMetrics {
    compute_hist: Arc<Mutex<Histogram<u64>>>,
    sample_age_hist: Arc<Mutex<Histogram<u64>>>,
    lock_wait_hist: Arc<Mutex<Histogram<u64>>>,
    // Jitter tracking (variance in cycle time)
    last_cycle_time_ns: Arc<AtomicU64>,
    jitter_hist: Arc<Mutex<Histogram<u64>>>,
}

impl TimingMetrics {
    pub fn new() -> Self {
        Self {
            compute_hist: Arc::new(Mutex::new(histogram())),
            sample_age_hist: Arc::new(Mutex::new(histogram())),
            lock_wait_hist: Arc::new(Mutex::new(histogram())),
            last_cycle_time_ns: Arc::new(AtomicU64::new(0)),
            jitter_hist: Arc::new(Mutex::new(histogram())),
        }
    }

    pub fn record_compute(&self, duration: Duration) {
        self.compute_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Age of the altitude sample at the moment the controller consumed it.
    pub fn record_sample_age(&self, age_ms: u64) {
        self.sample_age_hist.lock().record(age_ms).ok();
    }

    pub fn record_lock_wait(&self, duration: Duration) {
        self.lock_wait_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Record jitter (variation between consecutive cycle times)
    pub fn record_cycle(&self, cycle: Duration) {
        let cycle_ns = cycle.as_nanos() as u64;
        let last = self.last_cycle_time_ns.swap(cycle_ns, Ordering::Relaxed);
        if last > 0 {
            self.jitter_hist.lock().record(cycle_ns.abs_diff(last)).ok();
        }
    }

    pub fn report(&self) -> MetricsReport {
        let compute = self.compute_hist.lock();
        let age = self.sample_age_hist.lock();
        let lock_wait = self.lock_wait_hist.lock();
        let jitter = self.jitter_hist.lock();

        MetricsReport {
            compute_p50: Duration::from_nanos(compute.value_at_quantile(0.5)),
            compute_p99: Duration::from_nanos(compute.value_at_quantile(0.99)),
            sample_age_p50_ms: age.value_at_quantile(0.5),
            sample_age_p99_ms: age.value_at_quantile(0.99),
            lock_wait_p50: Duration::from_nanos(lock_wait.value_at_quantile(0.5)),
            lock_wait_p99: Duration::from_nanos(lock_wait.value_at_quantile(0.99)),
            jitter_p50: Duration::from_nanos(jitter.value_at_quantile(0.5)),
            jitter_p99: Duration::from_nanos(jitter.value_at_quantile(0.99)),
            computed_cycles: compute.len(),
        }
    }
}

impl Default for TimingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsReport {
    pub compute_p50: Duration,
    pub compute_p99: Duration,
    pub sample_age_p50_ms: u64,
    pub sample_age_p99_ms: u64,
    pub lock_wait_p50: Duration,
    pub lock_wait_p99: Duration,
    pub jitter_p50: Duration,
    pub jitter_p99: Duration,
    pub computed_cycles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_reflects_recorded_values() {
        let m = TimingMetrics::new();
        for age in [10, 20, 30] {
            m.record_sample_age(age);
        }
        m.record_compute(Duration::from_micros(5));
        let r = m.report();
        assert_eq!(r.sample_age_p50_ms, 20);
        assert_eq!(r.computed_cycles, 1);
        assert!(r.compute_p50 >= Duration::from_micros(4));
    }

    #[test]
    fn jitter_needs_two_cycles() {
        let m = TimingMetrics::new();
        m.record_cycle(Duration::from_millis(10));
        assert_eq!(m.report().jitter_p99, Duration::ZERO);
        m.record_cycle(Duration::from_millis(12));
        let j = m.report().jitter_p99;
        assert!(j >= Duration::from_micros(1_990) && j <= Duration::from_micros(2_010));
    }
}
