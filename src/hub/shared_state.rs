use log::{info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HubError, HubResult};

/// How long a guarded accessor may wait before it gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_millis(5),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Degraded,
}

/// Tracks lock budgets that ran out on one resource. An exhausted budget
/// degrades that resource until its next successful access.
#[derive(Debug, Default)]
pub struct FreshnessMonitor {
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
}

impl FreshnessMonitor {
    pub fn record_failure(&self, resource: &'static str) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        if self.consecutive_failures.fetch_add(1, Ordering::AcqRel) == 0 {
            warn!("[HUB] {resource} data freshness degraded");
        }
    }

    pub fn record_success(&self, resource: &'static str) {
        if self.consecutive_failures.swap(0, Ordering::AcqRel) > 0 {
            info!("[HUB] {resource} data freshness restored");
        }
    }

    pub fn state(&self) -> Freshness {
        if self.consecutive_failures.load(Ordering::Acquire) == 0 {
            Freshness::Fresh
        } else {
            Freshness::Degraded
        }
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }
}

/// A value that is only ever touched as a whole, under its own lock.
///
/// Every accessor takes a scoped guard, so the lock is released on every exit
/// path, including a panic inside the closure. Each guarded value keeps its own
/// freshness; clones share it.
pub struct Guarded<T> {
    name: &'static str,
    value: Arc<Mutex<T>>,
    policy: LockPolicy,
    freshness: Arc<FreshnessMonitor>,
}

impl<T> Clone for Guarded<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            value: Arc::clone(&self.value),
            policy: self.policy,
            freshness: Arc::clone(&self.freshness),
        }
    }
}

impl<T: Copy> Guarded<T> {
    pub fn new(name: &'static str, initial: T, policy: LockPolicy) -> Self {
        Self {
            name,
            value: Arc::new(Mutex::new(initial)),
            policy,
            freshness: Arc::new(FreshnessMonitor::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness.state()
    }

    pub fn lock_failures(&self) -> u64 {
        self.freshness.total_failures()
    }

    /// Single non-blocking attempt; `None` simply means someone else holds the lock.
    pub fn try_read(&self) -> Option<T> {
        self.value.try_lock().map(|guard| *guard)
    }

    pub fn try_write(&self, value: T) -> bool {
        match self.value.try_lock() {
            Some(mut guard) => {
                *guard = value;
                true
            }
            None => false,
        }
    }

    pub fn read(&self) -> HubResult<T> {
        self.update(|current| *current)
    }

    pub fn write(&self, value: T) -> HubResult<()> {
        self.update(|current| *current = value)
    }

    /// Run `f` on the value under the lock, within the retry budget.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> HubResult<R> {
        let attempts = self.policy.max_attempts.max(1);
        for _ in 0..attempts {
            if let Some(mut guard) = self.value.try_lock_for(self.policy.attempt_timeout) {
                let result = f(&mut guard);
                drop(guard);
                self.freshness.record_success(self.name);
                return Ok(result);
            }
        }
        self.freshness.record_failure(self.name);
        Err(HubError::LockTimeout {
            resource: self.name,
            attempts,
        })
    }

    #[cfg(test)]
    pub(crate) fn hold_for_test(&self) -> parking_lot::MutexGuard<'_, T> {
        self.value.lock()
    }
}
