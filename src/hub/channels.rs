use crossbeam::channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// What a non-blocking send does when the channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued item so the newest always gets in.
    KeepLatest,
    /// Refuse the incoming item.
    RejectNewest,
    /// Never drop: producers are expected to use [`Channel::send_timeout`].
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    DisplacedOldest,
}

/// Bounded FIFO between two threads.
///
/// The channel keeps both ends, so it is never disconnected while a clone is alive.
#[derive(Clone)]
pub struct Channel<T> {
    name: &'static str,
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> Channel<T> {
    pub fn new(name: &'static str, capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            name,
            tx,
            rx,
            capacity,
            policy,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Non-blocking send under the channel's overflow policy.
    /// A rejected item is handed back in `Err`.
    pub fn try_send(&self, item: T) -> Result<Delivery, T> {
        let mut item = item;
        let mut displaced = false;
        // other producers may refill the slot we just freed; give up after one lap
        for _ in 0..=self.capacity {
            match self.tx.try_send(item) {
                Ok(()) if displaced => return Ok(Delivery::DisplacedOldest),
                Ok(()) => return Ok(Delivery::Delivered),
                Err(TrySendError::Full(back)) if self.policy == OverflowPolicy::KeepLatest => {
                    let _ = self.rx.try_recv();
                    displaced = true;
                    item = back;
                }
                Err(TrySendError::Full(back)) | Err(TrySendError::Disconnected(back)) => {
                    return Err(back)
                }
            }
        }
        Err(item)
    }

    /// Block until there is room or `timeout` elapses; the item comes back on timeout.
    pub fn send_timeout(&self, item: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        self.tx.send_timeout(item, timeout)
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// `None` on timeout; the caller falls back to its last known value.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    /// Wait up to `timeout` for an item, then skip ahead to the newest one queued.
    pub fn recv_latest(&self, timeout: Duration) -> Option<T> {
        let first = self.recv_timeout(timeout)?;
        Some(self.rx.try_iter().last().unwrap_or(first))
    }
}
