//! Thread-safe counters

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Concurrency-safe signed tally
pub trait Counter: Send + Sync {
    fn increment(&self);

    fn decrement(&self);

    /// Current value
    fn value(&self) -> i64;
}

/// Lock-free counter
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for AtomicCounter {
    fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Mutex-backed counter
#[derive(Debug, Default)]
pub struct MutexCounter {
    value: Mutex<i64>,
}

impl MutexCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, delta: i64) {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        *value += delta;
    }
}

impl Counter for MutexCounter {
    fn increment(&self) {
        self.update(1);
    }

    fn decrement(&self) {
        self.update(-1);
    }

    fn value(&self) -> i64 {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
