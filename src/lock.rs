//! Per-name execution locks for lockable jobs.
//!
//! One mutex guards the whole map. Operations are O(1) and the map only
//! holds names that are currently running, so contention stays low.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};

/// State recorded for a locked job name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    pub running: bool,
    pub last_run: DateTime<Utc>,
}

/// Tracks which job names are executing. A name absent from the map is unlocked.
#[derive(Debug, Default)]
pub struct LockManager {
    jobs: Mutex<HashMap<String, LockEntry>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the exclusive slot for `name`.
    ///
    /// Fails with [`Error::AlreadyRunning`] if the name is held. Otherwise
    /// records `{running: true, last_run: now}` and returns the entry. The
    /// check and the insert happen under one lock acquisition.
    pub fn lock(&self, name: &str) -> Result<LockEntry> {
        let mut jobs = self.jobs();
        if jobs.get(name).is_some_and(|entry| entry.running) {
            return Err(Error::AlreadyRunning(name.to_string()));
        }
        let entry = LockEntry {
            running: true,
            last_run: Utc::now(),
        };
        jobs.insert(name.to_string(), entry);
        debug!(job = name, "lock acquired");
        Ok(entry)
    }

    /// Release `name`. Unlocking an unknown or already-unlocked name is a no-op.
    pub fn unlock(&self, name: &str) {
        if self.jobs().remove(name).is_some() {
            debug!(job = name, "lock released");
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.jobs().get(name).is_some_and(|entry| entry.running)
    }

    /// Start time of the current run of `name`, if it is running.
    pub fn last_run(&self, name: &str) -> Option<DateTime<Utc>> {
        self.jobs().get(name).map(|entry| entry.last_run)
    }

    /// Number of names currently held.
    pub fn held(&self) -> usize {
        self.jobs().len()
    }

    // A panic while holding the map lock cannot leave an entry half-written,
    // so a poisoned mutex is still safe to use.
    fn jobs(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
