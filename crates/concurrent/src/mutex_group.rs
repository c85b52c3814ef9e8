//! MutexGroup - registry of named locks
//!
//! Locks are registered by name and then locked as a set. Registration and
//! unregistration are all-or-nothing. Locking resolves every name before
//! taking any lock, and takes the locks in sorted order so that two
//! overlapping `lock` calls cannot deadlock against each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{ConcurrentError, Result};

type NamedLock = Arc<AsyncMutex<()>>;

/// Registry of named locks
#[derive(Debug, Default)]
pub struct MutexGroup {
    locks: Mutex<HashMap<String, NamedLock>>,
}

/// Held locks of one `lock` call; released on drop
#[derive(Debug)]
pub struct MutexGroupGuard {
    names: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl MutexGroupGuard {
    /// Locked names in acquisition order
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl MutexGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one lock per name
    ///
    /// Fails without registering anything if any name is already taken.
    pub fn register<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut locks = self.registry();

        let mut seen = BTreeSet::new();
        for name in &names {
            if locks.contains_key(name) || !seen.insert(name.as_str()) {
                return Err(ConcurrentError::already_registered(name.as_str()));
            }
        }

        for name in names {
            debug!(name = %name, "registering mutex");
            locks.insert(name, Arc::new(AsyncMutex::new(())));
        }
        Ok(())
    }

    /// Remove the named locks
    ///
    /// Fails without removing anything if any name is unknown. Guards that
    /// are currently held stay valid until dropped.
    pub fn unregister<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut locks = self.registry();

        if let Some(missing) = names.iter().find(|n| !locks.contains_key(n.as_str())) {
            return Err(ConcurrentError::not_registered(missing.as_str()));
        }

        for name in &names {
            locks.remove(name);
        }
        Ok(())
    }

    /// Registered names, sorted
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry().contains_key(name)
    }

    /// Lock every named mutex, waiting as needed
    ///
    /// Duplicate names are locked once.
    pub async fn lock(&self, names: &[&str]) -> Result<MutexGroupGuard> {
        let resolved = self.resolve(names)?;

        let mut guards = Vec::with_capacity(resolved.len());
        let mut locked = Vec::with_capacity(resolved.len());
        for (name, lock) in resolved {
            guards.push(lock.lock_owned().await);
            locked.push(name);
        }

        Ok(MutexGroupGuard {
            names: locked,
            _guards: guards,
        })
    }

    /// Lock every named mutex or none
    ///
    /// Returns `WouldBlock` if any of them is currently held.
    pub fn try_lock(&self, names: &[&str]) -> Result<MutexGroupGuard> {
        let resolved = self.resolve(names)?;

        let mut guards = Vec::with_capacity(resolved.len());
        let mut locked = Vec::with_capacity(resolved.len());
        for (name, lock) in resolved {
            // dropping `guards` on error releases what was taken so far
            let guard = lock.try_lock_owned().map_err(|_| ConcurrentError::WouldBlock)?;
            guards.push(guard);
            locked.push(name);
        }

        Ok(MutexGroupGuard {
            names: locked,
            _guards: guards,
        })
    }

    /// Sorted, de-duplicated (name, lock) pairs; fails on the first unknown name
    fn resolve(&self, names: &[&str]) -> Result<Vec<(String, NamedLock)>> {
        let locks = self.registry();
        let unique: BTreeSet<&str> = names.iter().copied().collect();

        unique
            .into_iter()
            .map(|name| {
                locks
                    .get(name)
                    .map(|lock| (name.to_string(), Arc::clone(lock)))
                    .ok_or_else(|| ConcurrentError::not_registered(name))
            })
            .collect()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, NamedLock>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
