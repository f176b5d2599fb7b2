//! Getter Call-Site Cache
//!
//! Binding a getter needs a pull function: read the bound store's state
//! through a guarded view, evaluate the getter, and lift a node result back
//! to a raw node. The cache builds that function once per getter identity
//! and hands the same one to every later binding, so any number of call
//! sites share a single pull function per getter.
//!
//! Entries live as long as the owning [`Registry`](crate::Registry), or until
//! evicted when the registry is configured with a capacity.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use super::{Getter, GetterId};
use crate::error::{Result, StoreError};
use crate::reactive::PullFn;
use crate::state::Datum;
use crate::store::Store;

/// Counters for one cache layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Bindings served from an existing pull function.
    pub hits: u64,
    /// Bindings that built and stored a new pull function.
    pub misses: u64,
    /// Bindings that bypassed the cache entirely.
    pub uncached: u64,
    /// Entries currently held.
    pub entries: usize,
}

#[derive(Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    uncached: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bypass(&self) {
        self.uncached.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            uncached: self.uncached.load(Ordering::Relaxed),
            entries,
        }
    }
}

pub(crate) fn new_lru<K: std::hash::Hash + Eq, V>(capacity: Option<NonZeroUsize>) -> LruCache<K, V> {
    match capacity {
        Some(capacity) => LruCache::new(capacity),
        None => LruCache::unbounded(),
    }
}

/// Evaluate a getter against a guarded view of `store`'s current state and
/// lift a node result back to the raw node.
pub(crate) fn evaluate_bound(getter: &Getter, store: &Store) -> Result<Datum> {
    let view = store.state().freeze();
    getter.evaluate(&view).map(Datum::unguard)
}

/// Pull functions keyed by getter identity.
pub(crate) struct GetterCache {
    entries: Mutex<LruCache<GetterId, PullFn<Datum>>>,
    counters: Counters,
}

impl GetterCache {
    pub(crate) fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            entries: Mutex::new(new_lru(capacity)),
            counters: Counters::default(),
        }
    }

    /// The shared pull function for `getter`, built on first request.
    pub(crate) fn pull_for(&self, getter: &Getter) -> Result<PullFn<Datum>> {
        let store = getter
            .store()
            .cloned()
            .ok_or(StoreError::UnboundGetter(getter.id()))?;

        let mut entries = self.entries.lock();
        if let Some(pull) = entries.get(&getter.id()) {
            self.counters.hit();
            tracing::trace!(getter = getter.id().raw(), "getter cache hit");
            return Ok(Arc::clone(pull));
        }

        let bound = getter.clone();
        let pull: PullFn<Datum> = Arc::new(move || evaluate_bound(&bound, &store));
        entries.put(getter.id(), Arc::clone(&pull));
        self.counters.miss();
        tracing::debug!(getter = getter.id().raw(), entries = entries.len(), "getter cache miss");
        Ok(pull)
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.lock().len())
    }
}
