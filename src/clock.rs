//! Scheduling primitives used by the executor between submissions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Source of timed waits and scheduling yields.
///
/// Waits must honour the stop flag so an abandoned run does not keep a
/// timer pending.
pub trait Clock: Send + Sync {
    /// Wait for `duration`, or until `stop` is raised.
    ///
    /// Returns `false` if the wait was cut short by `stop`.
    fn sleep(&self, duration: Duration, stop: &AtomicBool) -> bool;

    /// Give up the rest of the current scheduling quantum.
    fn yield_now(&self);
}

/// Real-time clock that sleeps in poll-interval slices.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    poll_interval: Duration,
}

impl SystemClock {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration, stop: &AtomicBool) -> bool {
        let start = Instant::now();
        loop {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return true;
            }
            std::thread::sleep(self.poll_interval.min(duration - elapsed));
        }
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}
