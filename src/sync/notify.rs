//! Wake-up signal
//!
//! Edge-triggered notification for a worker that sleeps until there is work.
//! Any number of `notify` calls made while the worker is busy collapse into
//! a single wake-up.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    closed: bool,
}

/// Coalescing wake-up signal with shutdown support
#[derive(Debug, Default)]
pub struct WakeSignal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl WakeSignal {
    /// Create a new, unsignalled wake-up signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the waiting worker. Never blocks beyond the internal lock.
    pub fn notify(&self) {
        let mut state = self.state.lock();
        state.pending = true;
        drop(state);
        self.condvar.notify_one();
    }

    /// Block until notified.
    ///
    /// Consumes the pending notification. Returns false once the signal has
    /// been closed, in which case the worker should exit.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while !state.pending && !state.closed {
            self.condvar.wait(&mut state);
        }
        if state.closed {
            return false;
        }
        state.pending = false;
        true
    }

    /// Check for a pending notification without blocking
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Close the signal, waking the worker for shutdown
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_notifications_coalesce() {
        let signal = WakeSignal::new();
        signal.notify();
        signal.notify();
        signal.notify();
        assert!(signal.is_pending());

        assert!(signal.wait());
        assert!(!signal.is_pending());
    }

    #[test]
    fn test_wait_wakes_on_notify() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || signal.wait())
        };
        signal.notify();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_close_releases_waiter() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || signal.wait())
        };
        signal.close();
        assert!(!waiter.join().unwrap());
    }
}
