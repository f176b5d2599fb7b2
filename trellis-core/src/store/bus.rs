//! Action Subscription Bus
//!
//! Every store keeps an ordered list of action subscribers. Each dispatch
//! notifies all of them, in registration order, before the action body
//! runs.
//!
//! Subscriptions made while a [`Scope`](crate::reactive::Scope) is current
//! are removed when that scope stops, unless registered as detached.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::action::ActionContext;
use crate::reactive::{on_scope_dispose, SubscriberId};

/// Callback notified before every action dispatch.
pub type ActionListener = Arc<dyn Fn(&ActionContext) + Send + Sync>;

type Cleanup = Box<dyn FnOnce() + Send>;

struct Entry {
    listener: ActionListener,
    on_cleanup: Option<Cleanup>,
}

type Entries = Mutex<IndexMap<SubscriberId, Entry>>;

/// Options for [`Store::on_action_with`](crate::Store::on_action_with).
#[derive(Default)]
pub struct SubscribeOptions {
    /// Keep the subscription alive past the current scope.
    pub detached: bool,
    /// Runs once when the subscription is removed through its handle or its
    /// scope.
    pub on_cleanup: Option<Cleanup>,
}

impl SubscribeOptions {
    /// Options for a subscription that outlives the current scope.
    pub fn detached() -> Self {
        Self {
            detached: true,
            on_cleanup: None,
        }
    }

    /// Attach a cleanup callback.
    pub fn on_cleanup(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self.on_cleanup = Some(Box::new(cleanup));
        self
    }
}

/// Handle returned by [`Store::on_action`](crate::Store::on_action).
#[derive(Clone)]
pub struct ActionSubscription {
    id: SubscriberId,
    entries: Weak<Entries>,
}

impl ActionSubscription {
    /// Id of this subscription.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscription. Returns whether anything was removed;
    /// calling it again is a no-op.
    pub fn unsubscribe(&self) -> bool {
        let Some(entries) = self.entries.upgrade() else {
            return false;
        };
        let removed = entries.lock().shift_remove(&self.id);
        match removed {
            Some(entry) => {
                if let Some(cleanup) = entry.on_cleanup {
                    cleanup();
                }
                true
            }
            None => false,
        }
    }

    /// Whether the subscription is still registered.
    pub fn is_active(&self) -> bool {
        self.entries
            .upgrade()
            .is_some_and(|entries| entries.lock().contains_key(&self.id))
    }
}

impl std::fmt::Debug for ActionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Ordered subscriber list for one store.
#[derive(Clone, Default)]
pub(crate) struct ActionBus {
    entries: Arc<Entries>,
}

impl ActionBus {
    pub(crate) fn subscribe(
        &self,
        listener: ActionListener,
        options: SubscribeOptions,
    ) -> ActionSubscription {
        let id = SubscriberId::new();
        self.entries.lock().insert(
            id,
            Entry {
                listener,
                on_cleanup: options.on_cleanup,
            },
        );

        let subscription = ActionSubscription {
            id,
            entries: Arc::downgrade(&self.entries),
        };

        if !options.detached {
            let handle = subscription.clone();
            if on_scope_dispose(move || {
                handle.unsubscribe();
            }) {
                tracing::trace!(subscription = id.raw(), "action subscription bound to scope");
            }
        }

        subscription
    }

    /// Notify every subscriber registered at the time of the call.
    pub(crate) fn notify(&self, context: &ActionContext) {
        let listeners: Vec<ActionListener> = self
            .entries
            .lock()
            .values()
            .map(|entry| Arc::clone(&entry.listener))
            .collect();
        for listener in listeners {
            listener(context);
        }
    }

    /// Drop every subscriber without running cleanups.
    pub(crate) fn clear(&self) {
        let drained = std::mem::take(&mut *self.entries.lock());
        drop(drained);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
