//! Actions
//!
//! An action is a store-bound operation that mutates state through the raw
//! state node. Dispatching one runs this lifecycle:
//!
//! 1. fail with [`StoreError::DisposedStore`] if the store is disposed,
//!    touching nothing else;
//! 2. notify every action subscriber with an [`ActionContext`], where they
//!    may register `after` and `on_error` hooks for this invocation;
//! 3. run the body;
//! 4. on success run the `after` hooks, each of which may replace the
//!    result; on failure run the `on_error` hooks and return the error.
//!
//! Step 4 happens immediately for a [`Completion::Ready`] result and when
//! the future settles for a [`Completion::Pending`] one.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;

use super::Store;
use crate::error::{Result, StoreError};

/// Hook run after a successful invocation. Returning `Some` replaces the
/// result seen by later hooks and by the caller.
pub type AfterHook = Box<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Hook run when an invocation fails.
pub type ErrorHook = Box<dyn Fn(&StoreError) + Send + Sync>;

/// Result of an action body or of a dispatch.
pub enum Completion {
    /// Finished synchronously.
    Ready(Value),
    /// Still running.
    Pending(BoxFuture<'static, Result<Value>>),
}

impl Completion {
    /// A finished result.
    pub fn ready(value: impl Into<Value>) -> Self {
        Completion::Ready(value.into())
    }

    /// A result still being computed.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        Completion::Pending(future.boxed())
    }

    /// Whether the result is still being computed.
    pub fn is_pending(&self) -> bool {
        matches!(self, Completion::Pending(_))
    }

    /// The value, if finished.
    pub fn into_ready(self) -> Option<Value> {
        match self {
            Completion::Ready(value) => Some(value),
            Completion::Pending(_) => None,
        }
    }

    /// Wait for the value.
    pub async fn settle(self) -> Result<Value> {
        match self {
            Completion::Ready(value) => Ok(value),
            Completion::Pending(future) => future.await,
        }
    }
}

impl From<Value> for Completion {
    fn from(value: Value) -> Self {
        Completion::Ready(value)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Completion::Pending(_) => f.write_str("Pending"),
        }
    }
}

#[derive(Default)]
struct Hooks {
    after: Mutex<Vec<AfterHook>>,
    error: Mutex<Vec<ErrorHook>>,
}

impl Hooks {
    fn run_after(&self, value: Value) -> Value {
        let hooks = std::mem::take(&mut *self.after.lock());
        hooks
            .iter()
            .fold(value, |current, hook| hook(&current).unwrap_or(current))
    }

    fn run_error(&self, err: &StoreError) {
        let hooks = std::mem::take(&mut *self.error.lock());
        for hook in &hooks {
            hook(err);
        }
    }
}

/// What action subscribers receive for one invocation.
pub struct ActionContext {
    name: String,
    args: Vec<Value>,
    store: Store,
    hooks: Arc<Hooks>,
}

impl ActionContext {
    /// Name the action was defined with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments of this invocation.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The store the action runs against.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run `hook` once this invocation succeeds.
    pub fn after<F>(&self, hook: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.hooks.after.lock().push(Box::new(hook));
    }

    /// Run `hook` if this invocation fails.
    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.hooks.error.lock().push(Box::new(hook));
    }
}

type Body = dyn Fn(&Store, &[Value]) -> Result<Completion> + Send + Sync;

struct ActionInner {
    name: String,
    store: Store,
    body: Box<Body>,
}

/// A mutating operation bound to a store.
#[derive(Clone)]
pub struct Action {
    inner: Arc<ActionInner>,
}

impl Action {
    pub(crate) fn new<F>(store: Store, name: String, body: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Completion> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ActionInner {
                name,
                store,
                body: Box::new(body),
            }),
        }
    }

    /// Name the action was defined with.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The store the action is bound to.
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Dispatch the action.
    pub fn call(&self, args: Vec<Value>) -> Result<Completion> {
        let store = &self.inner.store;
        if store.is_disposed() {
            tracing::warn!(store = store.id(), action = %self.inner.name, "dispatch on disposed store");
            return Err(StoreError::DisposedStore {
                store: store.id().to_owned(),
            });
        }

        let hooks = Arc::new(Hooks::default());
        let context = ActionContext {
            name: self.inner.name.clone(),
            args: args.clone(),
            store: store.clone(),
            hooks: Arc::clone(&hooks),
        };
        store.bus().notify(&context);
        tracing::debug!(store = store.id(), action = %self.inner.name, args = args.len(), "dispatching action");

        match (self.inner.body)(store, &args) {
            Ok(Completion::Ready(value)) => Ok(Completion::Ready(hooks.run_after(value))),
            Ok(Completion::Pending(future)) => Ok(Completion::Pending(
                async move {
                    match future.await {
                        Ok(value) => Ok(hooks.run_after(value)),
                        Err(err) => {
                            hooks.run_error(&err);
                            Err(err)
                        }
                    }
                }
                .boxed(),
            )),
            Err(err) => {
                hooks.run_error(&err);
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.inner.name)
            .field("store", &self.inner.store.id())
            .finish()
    }
}
