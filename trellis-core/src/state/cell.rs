//! The shared state cell behind every [`Node`](super::Node).

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::reactive::{next_source_id, Runtime, SubscriberId};

/// Notification sent to mutation listeners after a raw write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    /// Id of the store owning the state ("" for standalone trees).
    pub store: String,
    /// Rendered path of the node the write went through.
    pub path: String,
}

pub(crate) type MutationListener = Arc<dyn Fn(&MutationEvent) + Send + Sync>;

/// A state tree plus its reactive source id.
pub(crate) struct StateCell {
    pub(crate) source: u64,
    pub(crate) label: String,
    pub(crate) root: RwLock<Value>,
    listeners: Mutex<IndexMap<SubscriberId, MutationListener>>,
}

impl StateCell {
    pub(crate) fn new(label: impl Into<String>, root: Value) -> Self {
        Self {
            source: next_source_id(),
            label: label.into(),
            root: RwLock::new(root),
            listeners: Mutex::new(IndexMap::new()),
        }
    }

    pub(crate) fn listen(&self, listener: MutationListener) -> SubscriberId {
        let id = SubscriberId::new();
        self.listeners.lock().insert(id, listener);
        id
    }

    pub(crate) fn unlisten(&self, id: SubscriberId) -> bool {
        self.listeners.lock().shift_remove(&id).is_some()
    }

    pub(crate) fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Bump the source version, then notify listeners outside the lock so a
    /// listener may write again or unsubscribe itself.
    pub(crate) fn changed(&self, path: String) {
        Runtime::notify_change(self.source);

        let listeners: Vec<MutationListener> = self.listeners.lock().values().cloned().collect();
        if listeners.is_empty() {
            return;
        }
        let event = MutationEvent {
            store: self.label.clone(),
            path,
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Drop for StateCell {
    fn drop(&mut self) {
        Runtime::retire(self.source);
    }
}
