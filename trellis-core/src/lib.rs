//! Trellis Core
//!
//! This crate provides composable, memoized getters over reactive state
//! stores. It implements:
//!
//! - Stores holding a JSON state tree, with actions and action subscriptions
//! - Getters composed from other getters, evaluated against a guarded view
//! - Shared reactive bindings, cached per getter and per factory arguments
//! - Writable bindings that read through a getter and write through an action
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, computed values, scopes and dependency tracking
//! - `state`: State trees, nodes and the getter guard
//! - `getter`: Getter composition, binding caches and factories
//! - `store`: Stores, actions and the action subscription bus
//! - `registry`: The owned scope for binding caches and named stores
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use trellis_core::{Completion, Getter, Registry};
//!
//! let registry = Registry::new();
//! let store = registry.use_store("counter", || json!({ "count": 1 }));
//!
//! // Derive a value
//! let get_double = store.compose(
//!     [Getter::direct(|s| s.get("count"))],
//!     |inputs| Ok((inputs[0].as_i64().unwrap_or(0) * 2).into()),
//! );
//! let double = registry.bind(&get_double)?;
//!
//! // Mutate through an action
//! let increment = store.define_action("increment", |store, _| {
//!     let count = store.state().get("count")?.as_i64().unwrap_or(0);
//!     store.state().set("count", count + 1)?;
//!     Ok(Completion::ready(count + 1))
//! });
//!
//! increment.call(vec![])?;
//! assert_eq!(double.get()?.as_i64(), Some(4));
//! ```

pub mod config;
pub mod error;
pub mod getter;
pub mod reactive;
pub mod registry;
pub mod state;
pub mod store;

pub use config::RegistryConfig;
pub use error::{ErrorKind, Result, StoreError};
pub use getter::{
    CacheStats, Factory, FactoryArg, FactoryArgs, Getter, GetterId, Inputs, ReactiveValue,
    WritableValue,
};
pub use registry::Registry;
pub use state::{Datum, MutationEvent, Node};
pub use store::{
    Action, ActionContext, ActionSubscription, Binding, Completion, Postponed, Store,
    SubscribeOptions,
};
