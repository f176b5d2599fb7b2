//! Stores
//!
//! A [`Store`] owns one state tree and one action bus. It is where getters
//! and actions are defined, so that both carry the store they belong to.
//!
//! Disposal tears down both layers: mutation listeners are dropped and the
//! store is marked disposed (the host side), and every action subscriber is
//! dropped (the bus side). Actions bound to a disposed store fail on their
//! next call. Getters keep working, and the registry's getter caches are
//! left alone.

mod action;
mod bus;
mod postponed;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::getter::{Getter, Inputs};
use crate::reactive::SubscriberId;
use crate::state::{Datum, MutationEvent, MutationListener, Node, StateCell};

pub use action::{Action, ActionContext, AfterHook, Completion, ErrorHook};
pub use bus::{ActionListener, ActionSubscription, SubscribeOptions};
pub use postponed::{Binding, Postponed};

pub(crate) use bus::ActionBus;

struct StoreInner {
    id: String,
    state: Arc<StateCell>,
    bus: ActionBus,
    disposed: AtomicBool,
}

/// Handle to a store. Clones share the store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store with an initial state tree.
    pub fn new(id: impl Into<String>, initial: Value) -> Self {
        let id = id.into();
        Self {
            inner: Arc::new(StoreInner {
                state: Arc::new(StateCell::new(id.clone(), initial)),
                id,
                bus: ActionBus::default(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Store id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Raw root node: reads and writes live state.
    pub fn state(&self) -> Node {
        Node::root(Arc::clone(&self.inner.state))
    }

    /// Guarded root node.
    pub fn view(&self) -> Node {
        self.state().freeze()
    }

    /// Mutate the whole state tree.
    ///
    /// `f` works on a copy of the tree and may read the store through any
    /// node while it runs. See [`Node::update`].
    pub fn patch(&self, f: impl FnOnce(&mut Value)) -> Result<()> {
        self.state().update(f)
    }

    /// Listen for raw writes to this store's state.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&MutationEvent) + Send + Sync + 'static,
    {
        let listener: MutationListener = Arc::new(listener);
        self.inner.state.listen(listener)
    }

    /// Stop a mutation listener. Returns whether anything was removed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.state.unlisten(id)
    }

    /// Number of mutation listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.state.listener_count()
    }

    /// Define a composed getter bound to this store.
    pub fn compose<I, F>(&self, dependencies: I, combiner: F) -> Getter
    where
        I: IntoIterator<Item = Getter>,
        F: Fn(&Inputs) -> Result<Datum> + Send + Sync + 'static,
    {
        Getter::composed_on(Some(self.clone()), dependencies, combiner)
    }

    /// Define a dependency-free getter bound to this store. `accessor`
    /// receives the state.
    pub fn getter<F>(&self, accessor: F) -> Getter
    where
        F: Fn(&Datum) -> Result<Datum> + Send + Sync + 'static,
    {
        self.compose(std::iter::empty(), move |inputs| match inputs.first() {
            Some(state) => accessor(state),
            None => Ok(Datum::Value(Value::Null)),
        })
    }

    /// Define an action bound to this store.
    pub fn define_action<F>(&self, name: impl Into<String>, body: F) -> Action
    where
        F: Fn(&Store, &[Value]) -> Result<Completion> + Send + Sync + 'static,
    {
        Action::new(self.clone(), name.into(), body)
    }

    /// Define an action whose body is asynchronous.
    pub fn define_async_action<F, Fut>(&self, name: impl Into<String>, body: F) -> Action
    where
        F: Fn(Store, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.define_action(name, move |store, args| {
            Ok(Completion::pending(body(store.clone(), args.to_vec())))
        })
    }

    /// Subscribe to action dispatches.
    ///
    /// Inside a running [`Scope`](crate::reactive::Scope), the subscription is
    /// removed when the scope stops.
    pub fn on_action<F>(&self, listener: F) -> ActionSubscription
    where
        F: Fn(&ActionContext) + Send + Sync + 'static,
    {
        self.on_action_with(listener, SubscribeOptions::default())
    }

    /// Subscribe to action dispatches with explicit options.
    pub fn on_action_with<F>(&self, listener: F, options: SubscribeOptions) -> ActionSubscription
    where
        F: Fn(&ActionContext) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(Arc::new(listener), options)
    }

    /// Number of action subscribers.
    pub fn action_subscriber_count(&self) -> usize {
        self.inner.bus.len()
    }

    pub(crate) fn bus(&self) -> &ActionBus {
        &self.inner.bus
    }

    /// Tear the store down.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.state.clear_listeners();
        self.inner.bus.clear();
        tracing::debug!(store = %self.inner.id, "store disposed");
    }

    /// Whether [`Store::dispose`] was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("disposed", &self.is_disposed())
            .field("action_subscribers", &self.action_subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::reactive::Scope;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    fn counter_store() -> (Store, Action) {
        let store = Store::new("counter", json!({ "count": 0 }));
        let increment = store.define_action("increment", |store, args| {
            let by = args.first().and_then(Value::as_i64).unwrap_or(1);
            let count = store.state().get("count")?.as_i64().unwrap_or_default() + by;
            store.state().set("count", count)?;
            Ok(Completion::ready(count))
        });
        (store, increment)
    }

    #[test]
    fn actions_mutate_state_and_return() {
        let (store, increment) = counter_store();

        let result = increment.call(vec![json!(2)]).unwrap();
        assert_eq!(result.into_ready(), Some(json!(2)));
        assert_eq!(store.state().get("count").unwrap(), Datum::from(2));
    }

    #[test]
    fn subscribers_see_each_invocation_before_the_body() {
        let (store, increment) = counter_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        store.on_action(move |ctx| {
            let count = ctx.store().state().get("count").unwrap().as_i64();
            seen_clone.lock().push((ctx.name().to_owned(), ctx.args().to_vec(), count));
        });

        increment.call(vec![json!(5)]).unwrap();
        increment.call(vec![]).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                ("increment".to_owned(), vec![json!(5)], Some(0)),
                ("increment".to_owned(), vec![], Some(5)),
            ]
        );
    }

    #[test]
    fn after_hooks_can_override_the_result() {
        let (store, increment) = counter_store();
        store.on_action(|ctx| {
            ctx.after(|value| Some(json!({ "wrapped": value })));
        });
        store.on_action(|ctx| {
            ctx.after(|value| {
                assert!(value.get("wrapped").is_some());
                None
            });
        });

        let result = increment.call(vec![]).unwrap().into_ready();
        assert_eq!(result, Some(json!({ "wrapped": 1 })));
    }

    #[test]
    fn failing_actions_run_error_hooks_only() {
        let store = Store::new("failing", json!({}));
        let explode = store.define_action("explode", |_, _| Err(StoreError::failed("boom")));
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();

        store.on_action(move |ctx| {
            log_clone.lock().push("before".to_string());
            let after_log = log_clone.clone();
            ctx.after(move |_| {
                after_log.lock().push("after".to_string());
                None
            });
            let error_log = log_clone.clone();
            ctx.on_error(move |err| error_log.lock().push(format!("error: {err}")));
        });

        assert_eq!(
            explode.call(vec![]).unwrap_err(),
            StoreError::failed("boom")
        );
        assert_eq!(*log.lock(), vec!["before".to_string(), "error: boom".to_string()]);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_runs_cleanup_once() {
        let (store, increment) = counter_store();
        let calls = Arc::new(AtomicI32::new(0));
        let cleanups = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let cleanups_clone = cleanups.clone();

        let subscription = store.on_action_with(
            move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            SubscribeOptions::default().on_cleanup(move || {
                cleanups_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        increment.call(vec![]).unwrap();
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        increment.call(vec![]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert!(!subscription.is_active());
    }

    #[test]
    fn scoped_subscriptions_end_with_their_scope() {
        let (store, _) = counter_store();
        let scope = Scope::new();

        let (scoped, detached) = scope.run(|| {
            (
                store.on_action(|_| {}),
                store.on_action_with(|_| {}, SubscribeOptions::detached()),
            )
        });
        let outside = store.on_action(|_| {});
        assert_eq!(store.action_subscriber_count(), 3);

        scope.stop();

        assert!(!scoped.is_active());
        assert!(detached.is_active());
        assert!(outside.is_active());
        assert_eq!(store.action_subscriber_count(), 2);
    }

    #[test]
    fn dispose_blocks_actions_and_drops_subscribers() {
        let (store, increment) = counter_store();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let subscription = store.on_action(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        store.subscribe(|_| {});

        store.dispose();

        assert!(store.is_disposed());
        assert_eq!(
            increment.call(vec![]).unwrap_err(),
            StoreError::DisposedStore { store: "counter".into() }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.state().get("count").unwrap(), Datum::from(0));
        assert_eq!(store.action_subscriber_count(), 0);
        assert_eq!(store.listener_count(), 0);
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn mutation_listeners_receive_paths() {
        let store = Store::new("profile", json!({ "user": { "name": "a" } }));
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let id = store.subscribe(move |event| events_clone.lock().push(event.clone()));

        let user = store.state().get("user").unwrap().into_node().unwrap();
        user.set("name", "b").unwrap();
        store.patch(|state| state["extra"] = json!(true)).unwrap();

        assert!(store.unsubscribe(id));
        store.state().set("ignored", 1).unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                MutationEvent { store: "profile".into(), path: "user".into() },
                MutationEvent { store: "profile".into(), path: String::new() },
            ]
        );
    }

    #[test]
    fn patch_may_read_through_nodes() {
        let store = Store::new("patch", json!({ "count": 3 }));
        let reader = store.state();

        store
            .patch(|state| {
                let count = reader.get("count").unwrap().as_i64().unwrap_or(0);
                state["double"] = json!(count * 2);
            })
            .unwrap();

        assert_eq!(store.state().get("double").unwrap(), Datum::from(6));
    }

    #[test]
    fn store_getter_receives_state() {
        let store = Store::new("g", json!({ "n": 4 }));
        let getter = store.getter(|state| state.get("n"));

        assert_eq!(getter.evaluate(&store.view()).unwrap(), Datum::from(4));
        assert!(getter.store().is_some_and(|s| s.ptr_eq(&store)));
        assert_eq!(getter.dependency_count(), 0);
    }
}
