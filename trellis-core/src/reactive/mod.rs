//! Reactive Primitives
//!
//! This module is the host reactive layer the getter engine consumes:
//! signals, computed values, the tracking context, owning scopes, and the
//! runtime version ledger.
//!
//! # Concepts
//!
//! ## Sources
//!
//! A source is anything whose changes can invalidate derived values: a
//! store's state cell or a [`Signal`]. Each source has an id and a version in
//! the [`Runtime`] ledger.
//!
//! ## Computed values
//!
//! A [`Computed`] caches the result of a pull function. Every source read
//! while the pull function runs is recorded with its version; the cache is
//! valid as long as none of those versions moved.
//!
//! ## Scopes
//!
//! A [`Scope`] is a consumer lifetime. Work registered while a scope is
//! current can be torn down when the scope stops.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: reading a source inside a running
//! computation records it on a thread-local context stack. This is the same
//! "transparent reactivity" model used by SolidJS, Vue 3, and Leptos.

mod signal;
mod context;
mod subscriber;
mod computed;
mod runtime;
mod scope;

pub use signal::Signal;
pub use context::ReactiveContext;
pub use subscriber::SubscriberId;
pub use computed::{Computed, ComputedState, PullFn};
pub use runtime::Runtime;
pub use scope::{on_scope_dispose, Scope};

pub(crate) use runtime::next_source_id;
