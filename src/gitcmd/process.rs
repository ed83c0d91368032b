//! gitcmd::process
//!
//! Registry of running git processes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A snapshot of one running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub id: u64,
    /// Redacted command line.
    pub description: String,
    pub started: Instant,
}

impl ProcessInfo {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Tracks every started command until its finish step runs.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, ProcessInfo>>,
}

impl ProcessRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<u64, ProcessInfo>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new process; the entry lives as long as the registration.
    pub fn register(self: &Arc<Self>, description: impl Into<String>) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let info = ProcessInfo {
            id,
            description: description.into(),
            started: Instant::now(),
        };
        self.entries().insert(id, info);
        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Running processes ordered by id.
    pub fn list(&self) -> Vec<ProcessInfo> {
        self.entries().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its registry entry when finished or dropped.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ProcessRegistry>,
    id: u64,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn finish(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.entries().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_finish() {
        let registry = ProcessRegistry::new();
        let first = registry.register("git cat-file --batch");
        let second = registry.register("git for-each-ref");

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id());
        assert_eq!(listed[1].description, "git for-each-ref");

        first.finish();
        assert_eq!(registry.len(), 1);
        drop(second);
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let registry = ProcessRegistry::new();
        let a = registry.register("a");
        let b = registry.register("b");
        assert_ne!(a.id(), b.id());
    }
}
