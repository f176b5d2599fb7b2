//! Registry
//!
//! The registry is the owned scope for everything that must be shared
//! between bindings: the getter cache, the factory cache, and a table of
//! named stores. Two bindings of the same getter made through one registry
//! share one pull function; bindings made through different registries do
//! not.
//!
//! A registry may be made the *active* one for the current thread, which is
//! what [`Postponed`](crate::Postponed) values activate against.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::getter::{
    CacheStats, Factory, FactoryArg, FactoryCache, Getter, GetterCache, ReactiveValue,
    WritableValue,
};
use crate::store::{Action, Store};

thread_local! {
    static ACTIVE: RefCell<Option<Registry>> = const { RefCell::new(None) };
}

struct RegistryInner {
    config: RegistryConfig,
    getters: GetterCache,
    factories: FactoryCache,
    stores: Mutex<IndexMap<String, Store>>,
}

/// Shared binding caches and store table. Clones share the registry.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// A registry with unbounded caches.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// A registry with the given cache bounds.
    pub fn with_config(config: RegistryConfig) -> Self {
        tracing::debug!(
            getter_capacity = ?config.getter_cache_capacity,
            factory_capacity = ?config.factory_cache_capacity,
            "creating registry"
        );
        Self {
            inner: Arc::new(RegistryInner {
                getters: GetterCache::new(config.getter_cache_capacity),
                factories: FactoryCache::new(config.factory_cache_capacity),
                stores: Mutex::new(IndexMap::new()),
                config,
            }),
        }
    }

    /// Configuration this registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Bind a store-bound getter to a reactive value.
    ///
    /// Fails with [`StoreError::UnboundGetter`](crate::StoreError::UnboundGetter)
    /// for getters that were not defined through a store.
    pub fn bind(&self, getter: &Getter) -> Result<ReactiveValue> {
        let pull = self.inner.getters.pull_for(getter)?;
        Ok(ReactiveValue::new(pull))
    }

    /// Bind a getter for reading and an action for writing.
    ///
    /// Writes call `action` with the written value followed by `extra_args`.
    pub fn bind_writable(
        &self,
        getter: &Getter,
        action: &Action,
        extra_args: Vec<Value>,
    ) -> Result<WritableValue> {
        let value = self.bind(getter)?;
        Ok(WritableValue::new(value, action.clone(), extra_args))
    }

    /// Bind the getter a factory produces for `args`.
    ///
    /// Calls whose arguments all dereference to primitives share a pull
    /// function; other calls get a fresh one. Refs among `args` are
    /// followed on every read either way.
    pub fn bind_factory(&self, factory: &Factory, args: Vec<FactoryArg>) -> ReactiveValue {
        ReactiveValue::new(self.inner.factories.pull_for(factory, args))
    }

    /// Getter cache counters.
    pub fn getter_stats(&self) -> CacheStats {
        self.inner.getters.stats()
    }

    /// Factory cache counters.
    pub fn factory_stats(&self) -> CacheStats {
        self.inner.factories.stats()
    }

    /// The store registered under `id`, creating it with `init` on first
    /// use.
    pub fn use_store(&self, id: &str, init: impl FnOnce() -> Value) -> Store {
        let mut stores = self.inner.stores.lock();
        if let Some(store) = stores.get(id) {
            return store.clone();
        }
        let store = Store::new(id, init());
        stores.insert(id.to_owned(), store.clone());
        tracing::debug!(store = id, "store registered");
        store
    }

    /// The store registered under `id`, if any.
    pub fn store(&self, id: &str) -> Option<Store> {
        self.inner.stores.lock().get(id).cloned()
    }

    /// Ids of registered stores, in registration order.
    pub fn store_ids(&self) -> Vec<String> {
        self.inner.stores.lock().keys().cloned().collect()
    }

    /// Dispose the store registered under `id` and forget it.
    pub fn dispose_store(&self, id: &str) -> bool {
        let removed = self.inner.stores.lock().shift_remove(id);
        match removed {
            Some(store) => {
                store.dispose();
                true
            }
            None => false,
        }
    }

    /// Make this registry the active one on the current thread, returning
    /// the previously active registry.
    pub fn set_active(&self) -> Option<Registry> {
        ACTIVE.with(|active| active.borrow_mut().replace(self.clone()))
    }

    /// The active registry on the current thread.
    pub fn active() -> Option<Registry> {
        ACTIVE.with(|active| active.borrow().clone())
    }

    /// Clear the active registry on the current thread.
    pub fn clear_active() -> Option<Registry> {
        ACTIVE.with(|active| active.borrow_mut().take())
    }

    /// Whether both handles refer to the same registry.
    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.inner.config)
            .field("stores", &self.store_ids())
            .finish()
    }
}
