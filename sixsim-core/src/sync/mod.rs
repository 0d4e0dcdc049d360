//! ## sixsim-core::sync
//! **Pause handshake between the run loop and a controller**
//!
//! [`PauseGate`] is a counting gate that starts closed. The run loop calls
//! [`PauseGate::wait`] when it reaches a pause point, a controller calls
//! [`PauseGate::signal`] to let it through. Each signal releases exactly one
//! wait, and a signal issued before the wait is kept rather than lost.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct PauseGate {
    permits: Mutex<usize>,
    opened: Condvar,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until a permit is available, then consumes it. No timeout.
    pub fn wait(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.opened.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Like [`PauseGate::wait`] but gives up after `timeout`. Returns whether
    /// a permit was consumed.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.opened.wait_for(&mut permits, timeout).timed_out() {
                break;
            }
        }
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Releases one waiter, now or in the future.
    pub fn signal(&self) {
        *self.permits.lock() += 1;
        self.opened.notify_one();
    }

    pub fn available(&self) -> usize {
        *self.permits.lock()
    }

    /// Drops any stored permits.
    pub fn reset(&self) {
        *self.permits.lock() = 0;
    }
}
