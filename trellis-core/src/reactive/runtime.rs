//! Reactive Runtime
//!
//! The runtime is the ledger that connects reactive sources to the computed
//! values reading them.
//!
//! # How It Works
//!
//! 1. Every source (a store's state cell, a signal) has an id and a version.
//!
//! 2. When a source changes, it calls [`Runtime::notify_change`], which bumps
//!    the version.
//!
//! 3. A computed value remembers the version of every source it read. On the
//!    next read it compares those against the ledger and recomputes only if
//!    one moved. Invalidation is therefore pull-based: nothing is pushed to
//!    computed values, and a value that is never read again costs nothing.
//!
//! The ledger also keeps source → subscriber edges, which is how the number
//! of live dependents of a source can be inspected.
//!
//! # Thread Safety
//!
//! The ledger is a process-wide table behind a lock. Versions are plain
//! counters so the lock is only held for map lookups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use parking_lot::RwLock;

use super::subscriber::SubscriberId;

/// Counter for generating unique source IDs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique source ID.
pub(crate) fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Default)]
struct Ledger {
    versions: HashMap<u64, u64>,
    dependents: HashMap<u64, Vec<SubscriberId>>,
}

static LEDGER: OnceLock<RwLock<Ledger>> = OnceLock::new();

fn ledger() -> &'static RwLock<Ledger> {
    LEDGER.get_or_init(|| RwLock::new(Ledger::default()))
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Current version of a source. Sources that never changed are at 0.
    pub fn version(source_id: u64) -> u64 {
        ledger()
            .read()
            .versions
            .get(&source_id)
            .copied()
            .unwrap_or(0)
    }

    /// Record that a source changed.
    ///
    /// Returns the new version.
    pub fn notify_change(source_id: u64) -> u64 {
        let mut ledger = ledger().write();
        let version = ledger.versions.entry(source_id).or_insert(0);
        *version += 1;
        *version
    }

    /// Record that a subscriber depends on a source.
    pub fn add_dependency(source_id: u64, subscriber_id: SubscriberId) {
        let mut ledger = ledger().write();
        let subscribers = ledger.dependents.entry(source_id).or_default();
        if !subscribers.contains(&subscriber_id) {
            subscribers.push(subscriber_id);
        }
    }

    /// Remove all dependencies for a subscriber.
    ///
    /// Called before a computation re-runs, and when it is dropped.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let mut ledger = ledger().write();
        ledger.dependents.retain(|_, subs| {
            subs.retain(|s| *s != subscriber_id);
            !subs.is_empty()
        });
    }

    /// Number of subscribers currently depending on a source.
    pub fn dependent_count(source_id: u64) -> usize {
        ledger()
            .read()
            .dependents
            .get(&source_id)
            .map_or(0, Vec::len)
    }

    /// Forget a source that will never be read again.
    pub fn retire(source_id: u64) {
        let mut ledger = ledger().write();
        ledger.versions.remove(&source_id);
        ledger.dependents.remove(&source_id);
    }
}
