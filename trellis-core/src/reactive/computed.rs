//! Computed Implementation
//!
//! A Computed is a cached derived value over a fallible pull function.
//!
//! # How Computed Values Work
//!
//! 1. On first access, the pull function runs inside a reactive context and
//!    its result is cached together with the version of every source it read.
//!
//! 2. On later accesses, the recorded versions are compared against the
//!    [`Runtime`] ledger. If none moved, the cached value is returned.
//!
//! 3. If any source moved (or the value was marked dirty), the pull function
//!    runs again and the recorded sources are replaced.
//!
//! 4. A failed pull is never cached: the error goes to the caller and the
//!    next access runs the pull function again.
//!
//! # Nesting
//!
//! When a computed value is read while another computation is running, the
//! sources it recorded are reported to that outer computation, whether the
//! read hit the cache or not. The outer value is therefore invalidated by
//! the same changes as the inner one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::fmt::Debug;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::SubscriberId;
use crate::error::Result;

/// Counter for generating unique computed IDs.
static COMPUTED_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique computed ID.
fn next_computed_id() -> u64 {
    COMPUTED_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Cache state for a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// A value is cached. It is still checked against source versions.
    Clean,

    /// The value must be recomputed on next access.
    Dirty,
}

/// Pull function evaluated by a [`Computed`].
pub type PullFn<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;

struct ComputedInner<T> {
    id: u64,
    subscriber_id: SubscriberId,
    compute: PullFn<T>,
    value: RwLock<Option<T>>,
    state: RwLock<ComputedState>,
    /// `(source id, version)` pairs observed during the last evaluation.
    sources: RwLock<Vec<(u64, u64)>>,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::clear_dependencies(self.subscriber_id);
    }
}

/// A cached derived value that recomputes only when its sources change.
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed value over a pull function.
    ///
    /// The pull function is not run until the first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self::from_pull(Arc::new(compute))
    }

    /// Create a computed value over an existing, possibly shared, pull
    /// function.
    pub fn from_pull(compute: PullFn<T>) -> Self {
        Self {
            inner: Arc::new(ComputedInner {
                id: next_computed_id(),
                subscriber_id: SubscriberId::new(),
                compute,
                value: RwLock::new(None),
                state: RwLock::new(ComputedState::Dirty),
                sources: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Get the computed value's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID used for dependency tracking.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// The pull function backing this value.
    pub fn pull(&self) -> &PullFn<T> {
        &self.inner.compute
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> Result<T> {
        let result = match self.cached() {
            Some(value) => Ok(value),
            None => self.recompute(),
        };
        self.report_sources();
        result
    }

    /// Force the next access to recompute.
    pub fn mark_dirty(&self) {
        *self.inner.state.write() = ComputedState::Dirty;
    }

    /// Get the current cache state.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.read()
    }

    /// Check if a value is cached.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of sources read during the last evaluation.
    pub fn source_count(&self) -> usize {
        self.inner.sources.read().len()
    }

    fn cached(&self) -> Option<T> {
        if *self.inner.state.read() != ComputedState::Clean {
            return None;
        }
        let stale = self
            .inner
            .sources
            .read()
            .iter()
            .any(|(source, version)| Runtime::version(*source) != *version);
        if stale {
            return None;
        }
        self.inner.value.read().clone()
    }

    fn recompute(&self) -> Result<T> {
        let inner = &self.inner;

        let (result, sources) = {
            let _ctx = ReactiveContext::enter(inner.subscriber_id);
            let result = (inner.compute)();
            (result, ReactiveContext::get_dependencies())
        };

        Runtime::clear_dependencies(inner.subscriber_id);
        let observed = sources
            .iter()
            .map(|source| {
                Runtime::add_dependency(*source, inner.subscriber_id);
                (*source, Runtime::version(*source))
            })
            .collect();
        *inner.sources.write() = observed;

        match result {
            Ok(value) => {
                *inner.value.write() = Some(value.clone());
                *inner.state.write() = ComputedState::Clean;
                Ok(value)
            }
            Err(err) => {
                *inner.value.write() = None;
                *inner.state.write() = ComputedState::Dirty;
                Err(err)
            }
        }
    }

    fn report_sources(&self) {
        if !ReactiveContext::is_active() {
            return;
        }
        for (source, _) in self.inner.sources.read().iter() {
            ReactiveContext::track_dependency(*source);
        }
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("source_count", &self.source_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::reactive::Signal;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn computed_runs_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });

        assert!(!computed.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(computed.get().unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_while_sources_are_unchanged() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();
        let signal = Signal::new(2);
        let signal_clone = signal.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(signal_clone.get() * 10)
        });

        assert_eq!(computed.get().unwrap(), 20);
        assert_eq!(computed.get().unwrap(), 20);
        assert_eq!(computed.get().unwrap(), 20);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(computed.source_count(), 1);
    }

    #[test]
    fn computed_recomputes_when_a_source_changes() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let computed = Computed::new(move || Ok(signal_clone.get() + 1));

        assert_eq!(computed.get().unwrap(), 2);

        signal.set(10);
        assert_eq!(computed.get().unwrap(), 11);
    }

    #[test]
    fn computed_recomputes_when_marked_dirty() {
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = counter.clone();

        let computed = Computed::new(move || Ok(counter_clone.load(Ordering::SeqCst)));

        assert_eq!(computed.get().unwrap(), 0);

        // Untracked input: only an explicit mark makes the change visible.
        counter.store(5, Ordering::SeqCst);
        assert_eq!(computed.get().unwrap(), 0);

        computed.mark_dirty();
        assert_eq!(computed.get().unwrap(), 5);
    }

    #[test]
    fn failed_pull_is_not_cached() {
        let fail = Signal::new(true);
        let fail_clone = fail.clone();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            if fail_clone.get_untracked() {
                Err(StoreError::failed("not yet"))
            } else {
                Ok(7)
            }
        });

        assert!(computed.get().is_err());
        assert!(computed.get().is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
        assert!(!computed.has_value());
        assert_eq!(computed.state(), ComputedState::Dirty);

        fail.set(false);
        assert_eq!(computed.get().unwrap(), 7);
        assert_eq!(computed.state(), ComputedState::Clean);
    }

    #[test]
    fn nested_computed_propagates_sources() {
        let base = Signal::new(5);
        let base_clone = base.clone();
        let doubled = Computed::new(move || Ok(base_clone.get() * 2));

        let doubled_clone = doubled.clone();
        let plus_ten = Computed::new(move || Ok(doubled_clone.get()? + 10));

        assert_eq!(doubled.get().unwrap(), 10);
        // `doubled` hits its cache here but still reports `base`.
        assert_eq!(plus_ten.get().unwrap(), 20);
        assert_eq!(plus_ten.source_count(), 1);

        base.set(10);
        assert_eq!(plus_ten.get().unwrap(), 30);
    }

    #[test]
    fn computed_registers_dependents_in_runtime() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let computed = Computed::new(move || Ok(signal_clone.get()));

        computed.get().unwrap();
        assert_eq!(Runtime::dependent_count(signal.id()), 1);

        drop(computed);
        assert_eq!(Runtime::dependent_count(signal.id()), 0);
    }

    #[test]
    fn clones_share_cache() {
        let computed1 = Computed::new(|| Ok(42));
        computed1.get().unwrap();

        let computed2 = computed1.clone();
        assert_eq!(computed1.id(), computed2.id());
        assert!(computed2.has_value());

        computed1.mark_dirty();
        assert_eq!(computed2.state(), ComputedState::Dirty);
    }
}
