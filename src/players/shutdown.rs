//! Cooperative cancellation.
//!
//! A `Shutdown` is a channel nobody ever sends on. Triggering it drops the
//! sender, which disconnects the receiver and wakes every thread blocked in a
//! `select!` on it. Interrupted waits are not errors: the waiting thread just
//! stops taking new work.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// One-shot termination signal shared by a set of threads.
#[derive(Debug)]
pub struct Shutdown {
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl Shutdown {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            trigger: Mutex::new(Some(trigger)),
            signal,
        }
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver to `select!` on. Becomes ready (disconnected) on trigger.
    #[must_use]
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Sleep for `duration` unless the signal fires first.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        matches!(self.signal.recv_timeout(duration), Err(RecvTimeoutError::Timeout))
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        assert!(shutdown.is_triggered());

        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_sleep_runs_full_duration() {
        let shutdown = Shutdown::new();
        let start = Instant::now();
        assert!(shutdown.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_trigger_interrupts_sleep() {
        let shutdown = Arc::new(Shutdown::new());
        let sleeper = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || shutdown.sleep(Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();

        assert!(!sleeper.join().unwrap());
    }

    #[test]
    fn test_triggered_sleep_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let start = Instant::now();
        assert!(!shutdown.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
