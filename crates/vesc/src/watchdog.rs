//! Heartbeat watchdog.
//!
//! The client pings the controller periodically; silence means loss of
//! control authority, and a real VESC answers that by cutting power. The
//! simulator mirrors it with a hard process exit.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::error;

/// Single-shot watchdog armed by the first heartbeat and re-armed by every
/// one after it. Expiry runs the configured action once.
pub struct HeartbeatWatchdog {
    timeout: Duration,
    inner: Arc<Inner>,
    on_expiry: Arc<dyn Fn() + Send + Sync>,
}

struct Inner {
    state: Mutex<State>,
    cv: Condvar,
}

#[derive(Default)]
struct State {
    generation: u64,
    armed: bool,
    cancelled: bool,
}

impl HeartbeatWatchdog {
    /// Production watchdog: expiry terminates the process with status 1,
    /// no graceful shutdown.
    pub fn new(timeout: Duration) -> Self {
        Self::with_action(timeout, || std::process::exit(1))
    }

    /// Watchdog with an injectable expiry action (tests observe a flag
    /// instead of dying).
    pub fn with_action(timeout: Duration, on_expiry: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            timeout,
            inner: Arc::new(Inner { state: Mutex::new(State::default()), cv: Condvar::new() }),
            on_expiry: Arc::new(on_expiry),
        }
    }

    /// Record a heartbeat: the first call arms the monitor, every later
    /// call pushes the deadline out by the full timeout.
    pub fn feed(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.generation += 1;
        if state.armed {
            self.inner.cv.notify_all();
            return;
        }
        state.armed = true;
        drop(state);

        let inner = Arc::clone(&self.inner);
        let timeout = self.timeout;
        let on_expiry = Arc::clone(&self.on_expiry);
        std::thread::Builder::new()
            .name("heartbeat-watchdog".into())
            .spawn(move || monitor(inner, timeout, on_expiry))
            .expect("spawn heartbeat watchdog thread");
    }

    /// Disarm without firing (shutdown path).
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.cancelled = true;
        self.inner.cv.notify_all();
    }
}

fn monitor(inner: Arc<Inner>, timeout: Duration, on_expiry: Arc<dyn Fn() + Send + Sync>) {
    let mut state = inner.state.lock().unwrap();
    'armed: loop {
        let generation = state.generation;
        let deadline = Instant::now() + timeout;
        loop {
            if state.cancelled {
                return;
            }
            if state.generation != generation {
                // Heartbeat arrived; restart the countdown.
                continue 'armed;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                drop(state);
                error!(
                    timeout_sec = timeout.as_secs_f64(),
                    "heartbeat not received in time, terminating simulation"
                );
                on_expiry();
                return;
            }
            let (guard, _) = inner.cv.wait_timeout(state, remaining).unwrap();
            state = guard;
        }
    }
}
