//! Debounce - run an action only after a quiet period
//!
//! Every call waits for the delay. When it wakes up, it runs the action
//! only if no other call started in the meantime, so a burst of calls
//! results in a single run by the last caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Debounce gate shared by concurrent callers
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    /// Wait for the delay, then run `f` if this is still the latest call
    ///
    /// Returns whether `f` ran.
    pub async fn call<F: FnOnce()>(&self, f: F) -> bool {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;

        if self.generation.load(Ordering::SeqCst) == ticket {
            f();
            true
        } else {
            false
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// An action bound to its own `Debouncer`
pub struct Debounced<F> {
    debouncer: Debouncer,
    action: F,
}

impl<F: Fn()> Debounced<F> {
    pub fn new(action: F, delay: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(delay),
            action,
        }
    }

    /// See [`Debouncer::call`]
    pub async fn call(&self) -> bool {
        self.debouncer.call(&self.action).await
    }
}
