//! # Concurrent
//!
//! Small synchronisation building blocks used next to the pipeline:
//!
//! - `AtomicCounter` / `MutexCounter`: thread-safe tallies behind the
//!   `Counter` trait
//! - `MutexGroup`: registry of named locks, locked and released as a set
//! - `RateLimiter`: N permits per period, with explicit shutdown
//! - `Debouncer` / `Debounced`: run an action only after a quiet period

pub mod counter;
pub mod debounce;
pub mod error;
pub mod mutex_group;
pub mod rate_limiter;

pub use counter::{AtomicCounter, Counter, MutexCounter};
pub use debounce::{Debounced, Debouncer};
pub use error::{ConcurrentError, Result};
pub use mutex_group::{MutexGroup, MutexGroupGuard};
pub use rate_limiter::RateLimiter;
