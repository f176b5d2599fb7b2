//! Postponed bindings
//!
//! Code that runs before any [`Registry`] exists (module setup, static
//! tables) cannot bind getters yet. A [`Postponed`] holds the activation
//! function and runs it on the first access made while a registry is
//! active. Until then every access is a no-op returning `None`.

use std::fmt;

use parking_lot::Mutex;

use crate::registry::Registry;

/// Whether a postponed value has been activated.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<T> {
    /// No registry was active on any access so far.
    Unbound,
    /// Activated value.
    Bound(T),
}

type Activate<T> = Box<dyn Fn(&Registry) -> T + Send + Sync>;

/// A value built lazily against the active registry.
pub struct Postponed<T> {
    activate: Activate<T>,
    state: Mutex<Binding<T>>,
}

impl<T: Clone> Postponed<T> {
    /// Wrap an activation function.
    pub fn new<F>(activate: F) -> Self
    where
        F: Fn(&Registry) -> T + Send + Sync + 'static,
    {
        Self {
            activate: Box::new(activate),
            state: Mutex::new(Binding::Unbound),
        }
    }

    /// The activated value, activating it if a registry is active now.
    pub fn get(&self) -> Option<T> {
        if let Binding::Bound(value) = &*self.state.lock() {
            return Some(value.clone());
        }

        let registry = Registry::active()?;
        let value = (self.activate)(&registry);

        let mut state = self.state.lock();
        match &*state {
            // Activated concurrently; keep the first value.
            Binding::Bound(existing) => Some(existing.clone()),
            Binding::Unbound => {
                tracing::debug!("postponed binding activated");
                *state = Binding::Bound(value.clone());
                Some(value)
            }
        }
    }

    /// Whether the value has been activated.
    pub fn is_bound(&self) -> bool {
        matches!(&*self.state.lock(), Binding::Bound(_))
    }

    /// Run `f` on the activated value, or return `R::default()` while no
    /// registry is active.
    pub fn with<R: Default>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.get().map(|value| f(&value)).unwrap_or_default()
    }
}

impl<T> fmt::Debug for Postponed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = matches!(&*self.state.lock(), Binding::Bound(_));
        f.debug_struct("Postponed").field("bound", &bound).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn inactive_access_is_a_no_op() {
        Registry::clear_active();
        let activations = Arc::new(AtomicI32::new(0));
        let activations_clone = activations.clone();
        let postponed = Postponed::new(move |_| {
            activations_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(postponed.get(), None);
        assert_eq!(postponed.with(|v| *v + 1), 0);
        assert!(!postponed.is_bound());
        assert_eq!(activations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn activates_once_under_an_active_registry() {
        let activations = Arc::new(AtomicI32::new(0));
        let activations_clone = activations.clone();
        let postponed = Postponed::new(move |_| {
            activations_clone.fetch_add(1, Ordering::SeqCst) + 10
        });

        let registry = Registry::new();
        registry.set_active();

        assert_eq!(postponed.get(), Some(10));
        assert_eq!(postponed.get(), Some(10));
        assert!(postponed.is_bound());
        assert_eq!(activations.load(Ordering::SeqCst), 1);

        Registry::clear_active();
        assert_eq!(postponed.get(), Some(10));
    }
}
