//! Signal Implementation
//!
//! A Signal is a single-value reactive container. It plays the role of a
//! "ref": getter factories accept signals as arguments and dereference them
//! on every evaluation, so a binding created once keeps following the
//! signal's current value.
//!
//! # How Signals Work
//!
//! 1. Reading a signal inside a reactive context records the signal as a
//!    source of that context.
//!
//! 2. Setting a signal bumps its version in the [`Runtime`] ledger.
//!
//! 3. Computed values that recorded the signal see the new version on their
//!    next read and recompute.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::{next_source_id, Runtime};

struct SignalCell<T> {
    id: u64,
    value: RwLock<T>,
}

impl<T> Drop for SignalCell<T> {
    fn drop(&mut self) {
        Runtime::retire(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value and id.
///
/// # Example
///
/// ```rust,ignore
/// let page = Signal::new(json!(1));
///
/// let value = page.get();
///
/// // Bump the version; computed values that read `page` recompute.
/// page.set(json!(2));
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    cell: Arc<SignalCell<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(SignalCell {
                id: next_source_id(),
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's unique source ID.
    pub fn id(&self) -> u64 {
        self.cell.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, the signal is recorded as a
    /// source of that context.
    pub fn get(&self) -> T {
        ReactiveContext::track_dependency(self.cell.id);
        self.cell.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.cell.value.read().clone()
    }

    /// Set a new value and bump the signal's version.
    pub fn set(&self, value: T) {
        *self.cell.value.write() = value;
        Runtime::notify_change(self.cell.id);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.cell.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Whether two handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.cell.id)
            .field("value", &self.get_untracked())
            .field("version", &Runtime::version(self.cell.id))
            .finish()
    }
}
