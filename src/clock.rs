//! Monotonic millisecond clock shared by the controller and the worker threads.
//!
//! Wraps `quanta::Clock` so every clone observes the same time base, and so tests
//! can drive time by hand through [`ControlClockMock`].

use quanta::{Clock, Instant, Mock};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ControlClock {
    inner: Clock,
    ref_time: Instant,
}

/// Handle that moves every clone of a mocked [`ControlClock`] forward.
#[derive(Clone, Debug)]
pub struct ControlClockMock(Arc<Mock>);

impl ControlClockMock {
    pub fn advance(&self, amount: Duration) {
        self.0.increment(amount);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn value_ms(&self) -> u64 {
        self.0.value() / 1_000_000
    }
}

impl ControlClock {
    /// Real clock, starting at 0 ms now.
    pub fn new() -> Self {
        let inner = Clock::new();
        let ref_time = inner.now();
        Self { inner, ref_time }
    }

    /// Fake clock starting at 0 ms that only moves when the mock is advanced.
    pub fn mock() -> (Self, ControlClockMock) {
        let (inner, mock) = Clock::mock();
        let ref_time = inner.now();
        (Self { inner, ref_time }, ControlClockMock(mock))
    }

    #[inline]
    pub fn now(&self) -> Duration {
        self.inner.now().duration_since(self.ref_time)
    }

    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.now().as_millis() as u64
    }

    /// Milliseconds since `earlier_ms`, saturating at zero.
    #[inline]
    pub fn elapsed_ms(&self, earlier_ms: u64) -> u64 {
        self.now_ms().saturating_sub(earlier_ms)
    }
}

impl Default for ControlClock {
    fn default() -> Self {
        Self::new()
    }
}
