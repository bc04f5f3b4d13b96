//! Generator lifecycle
//!
//! A [`Lifecycle`] is shared between a generator, its [`StopHandle`]s and any
//! termination-signal handler. Stopping only raises a flag; the receive loop
//! observes it at its next iteration boundary and releases the socket itself
//! through its [`RunGuard`].

mod state;

pub use state::GeneratorState;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use crate::error::LifecycleError;
use state::Phase;

struct Inner {
    phase: Mutex<Phase>,
    changed: Condvar,
    stop_requested: AtomicBool,
    stop_notify: Notify,
}

/// Shared state machine of one generator instance
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                phase: Mutex::new(Phase::Idle),
                changed: Condvar::new(),
                stop_requested: AtomicBool::new(false),
                stop_notify: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> GeneratorState {
        self.inner.phase.lock().observed()
    }

    pub fn is_running(&self) -> bool {
        self.state() == GeneratorState::Running
    }

    /// Whether a stop was requested
    pub fn stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }

    /// A handle that can stop this generator from anywhere
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            lifecycle: self.clone(),
        }
    }

    /// Claim the generator for a run
    ///
    /// Fails if a run was already accepted or the generator is stopped.
    pub fn begin(&self) -> Result<RunGuard, LifecycleError> {
        let mut phase = self.inner.phase.lock();
        match *phase {
            Phase::Idle => {
                *phase = Phase::Starting;
                Ok(RunGuard {
                    lifecycle: self.clone(),
                })
            }
            Phase::Starting | Phase::Running => Err(LifecycleError::AlreadyRunning),
            Phase::Stopped => Err(LifecycleError::Terminated),
        }
    }

    /// Block until setup finished, returning the state it settled in
    pub fn wait_settled(&self) -> GeneratorState {
        let mut phase = self.inner.phase.lock();
        while !phase.is_settled() {
            self.inner.changed.wait(&mut phase);
        }
        phase.observed()
    }

    /// Resolve once a stop is requested
    ///
    /// Any number of callers may wait at the same time; all of them resolve.
    pub async fn stopped(&self) {
        let notified = self.inner.stop_notify.notified();
        tokio::pin!(notified);
        loop {
            // Must be registered before the flag is read
            notified.as_mut().enable();
            if self.stop_requested() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.inner.stop_notify.notified());
        }
    }

    fn set_phase(&self, next: Phase) {
        let mut phase = self.inner.phase.lock();
        *phase = next;
        self.inner.changed.notify_all();
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

/// Requests a generator stop
///
/// Cheap to clone and safe to call from other threads or a signal handler.
#[derive(Clone, Debug)]
pub struct StopHandle {
    lifecycle: Lifecycle,
}

impl StopHandle {
    /// Ask the generator to stop
    ///
    /// Idempotent; returns `true` only for the call that raised the flag.
    pub fn stop(&self) -> bool {
        let first = !self
            .lifecycle
            .inner
            .stop_requested
            .swap(true, Ordering::SeqCst);
        if first {
            tracing::info!("Generator stop requested");
            self.lifecycle.inner.stop_notify.notify_waiters();
        }
        first
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn state(&self) -> GeneratorState {
        self.lifecycle.state()
    }
}

/// Scoped ownership of a run
///
/// Dropping the guard moves the generator to `Stopped`, whichever way the run
/// ends (clean stop, runtime limit, error or panic).
#[derive(Debug)]
pub struct RunGuard {
    lifecycle: Lifecycle,
}

impl RunGuard {
    /// Setup succeeded, enter `Running`
    pub fn running(&self) {
        self.lifecycle.set_phase(Phase::Running);
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.lifecycle.set_phase(Phase::Stopped);
    }
}
