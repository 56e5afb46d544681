//! Single-slot timeout ticker
//!
//! Holds at most one pending deadline. Scheduling a new timeout aborts the
//! pending one; an expired timeout is delivered once on the tock channel and
//! is not repeated.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Buffered tocks before the timer task waits on the consumer
const TICK_TOCK_BUFFER_SIZE: usize = 10;

/// Delivered when a scheduled timeout expires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutInfo {
    pub duration: Duration,
}

impl TimeoutInfo {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

pub struct TimeoutTicker {
    tock_tx: mpsc::Sender<TimeoutInfo>,
    tock_rx: Mutex<Option<mpsc::Receiver<TimeoutInfo>>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl TimeoutTicker {
    pub fn new() -> Self {
        let (tock_tx, tock_rx) = mpsc::channel(TICK_TOCK_BUFFER_SIZE);
        Self {
            tock_tx,
            tock_rx: Mutex::new(Some(tock_rx)),
            pending: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Hand out the tock channel; there is a single consumer, so this succeeds once
    pub fn take_tock_receiver(&self) -> Option<mpsc::Receiver<TimeoutInfo>> {
        self.tock_rx.lock().take()
    }

    /// Arm a deadline `ti.duration` from now, replacing any pending one.
    ///
    /// Must be called from within a Tokio runtime. Ignored after `stop`.
    pub fn schedule_timeout(&self, ti: TimeoutInfo) {
        // `stopped` is only set under this lock, so no task outlives `stop`
        let mut pending = self.pending.lock();
        if self.stopped.load(Ordering::SeqCst) {
            debug!(timeout = ?ti.duration, "Ticker stopped, ignoring timeout");
            return;
        }

        let tock_tx = self.tock_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(ti.duration).await;
            if tock_tx.send(ti).await.is_err() {
                warn!("Timeout ticker has no consumer, dropping tock");
            }
        });

        if let Some(previous) = pending.replace(task) {
            previous.abort();
        }
    }

    /// Cancel the pending deadline, if any; further schedules are ignored
    pub fn stop(&self) {
        let mut pending = self.pending.lock();
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = pending.take() {
            task.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Default for TimeoutTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimeoutTicker {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.abort();
        }
    }
}
