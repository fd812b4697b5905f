//! Operator-set version pins.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-wide map of remote name -> pinned version.
///
/// Empty by default, in which case each remote's manifest `activeVersion`
/// governs. Cache invalidation on change is the resolver's job.
#[derive(Debug, Default)]
pub struct VersionOverrides {
    pins: Mutex<BTreeMap<String, String>>,
}

impl VersionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `remote` to `version`, returning the previous pin.
    pub fn set(&self, remote: &str, version: &str) -> Option<String> {
        self.lock().insert(remote.to_string(), version.to_string())
    }

    /// Remove the pin for `remote`, returning it.
    pub fn remove(&self, remote: &str) -> Option<String> {
        self.lock().remove(remote)
    }

    pub fn get(&self, remote: &str) -> Option<String> {
        self.lock().get(remote).cloned()
    }

    /// Copy of every pin.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
