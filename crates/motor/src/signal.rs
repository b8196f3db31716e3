//! Binary setpoint signal.

use std::sync::{Condvar, Mutex};

/// Bound-1 signal between the command processor and a control task.
///
/// Repeated releases collapse into one wakeup, so a burst of identical
/// setpoints arms the waiting task exactly once. Created drained: the first
/// `acquire` blocks until someone releases.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<State>,
    cv: Condvar,
}

#[derive(Debug, Default)]
struct State {
    available: bool,
    unblocked: bool,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release the signal. Saturates at one pending wakeup.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.available = true;
        self.cv.notify_one();
    }

    /// Permanently unblock all waiters (shutdown path).
    pub fn unblock(&self) {
        let mut state = self.state.lock().unwrap();
        state.unblocked = true;
        self.cv.notify_all();
    }

    /// Block until released. Returns `false` if the signal was permanently
    /// unblocked instead.
    pub fn acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.available {
                state.available = false;
                return true;
            }
            if state.unblocked {
                return false;
            }
            state = self.cv.wait(state).unwrap();
        }
    }
}
