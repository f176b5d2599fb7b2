//! Getters
//!
//! A getter derives a value from a state tree. Getters come in two kinds:
//!
//! - **direct** getters wrap a plain function of the state node;
//! - **composed** getters hold an ordered list of dependency getters and a
//!   combiner. Evaluating one against a state node evaluates every
//!   dependency against that same node, left to right, and hands their
//!   results to the combiner in the same order. With no dependencies the
//!   combiner receives the state node itself.
//!
//! Composed getters defined through [`Store::compose`](crate::Store::compose)
//! remember their store, which is what the binding layer evaluates them
//! against.
//!
//! # Example
//!
//! ```rust,ignore
//! let get_codes = store.compose(
//!     [Getter::direct(|s| s.get("data"))],
//!     |inputs| inputs[0].get("codes"),
//! );
//! let get_code_a = store.compose([get_codes], |inputs| inputs[0].get("a"));
//! ```
//!
//! Getters are pure by contract. The binding layer enforces it by handing
//! them a guarded view of state, see [`Node::freeze`].

mod binding;
mod cache;
mod factory;

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::state::{Datum, Node};
use crate::store::Store;

pub use binding::{ReactiveValue, WritableValue};
pub use cache::CacheStats;
pub use factory::{Callback, Factory, FactoryArg, FactoryArgs, FactoryId, Resolved};

pub(crate) use cache::GetterCache;
pub(crate) use factory::FactoryCache;

/// Unique identifier for a getter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GetterId(u64);

impl GetterId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Accessor = dyn Fn(&Node) -> Result<Datum> + Send + Sync;
type Combiner = dyn Fn(&Inputs) -> Result<Datum> + Send + Sync;

enum GetterKind {
    Direct(Box<Accessor>),
    Composed {
        dependencies: Vec<Getter>,
        combiner: Box<Combiner>,
    },
}

struct GetterInner {
    id: GetterId,
    kind: GetterKind,
    store: Option<Store>,
}

/// A derived-data accessor over a state tree.
///
/// Cloning is cheap and keeps the identity: clones share one [`GetterId`]
/// and therefore one cache entry.
#[derive(Clone)]
pub struct Getter {
    inner: Arc<GetterInner>,
}

/// Positional combiner inputs.
///
/// Dereferences to the dependency results, in declaration order.
pub struct Inputs {
    values: Vec<Datum>,
    store: Option<Store>,
}

impl Inputs {
    /// The store the getter was defined on, if any.
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// Take the dependency results.
    pub fn into_values(self) -> Vec<Datum> {
        self.values
    }
}

impl Deref for Inputs {
    type Target = [Datum];

    fn deref(&self) -> &[Datum] {
        &self.values
    }
}

impl Getter {
    /// A getter over a plain function of the state node.
    ///
    /// Direct getters carry no store and are never cached by the binding
    /// layer; use them as dependencies or call them with
    /// [`Getter::evaluate`].
    pub fn direct<F>(accessor: F) -> Self
    where
        F: Fn(&Node) -> Result<Datum> + Send + Sync + 'static,
    {
        Self::build(GetterKind::Direct(Box::new(accessor)), None)
    }

    /// A composed getter with no store.
    pub fn compose<I, F>(dependencies: I, combiner: F) -> Self
    where
        I: IntoIterator<Item = Getter>,
        F: Fn(&Inputs) -> Result<Datum> + Send + Sync + 'static,
    {
        Self::composed_on(None, dependencies, combiner)
    }

    pub(crate) fn composed_on<I, F>(store: Option<Store>, dependencies: I, combiner: F) -> Self
    where
        I: IntoIterator<Item = Getter>,
        F: Fn(&Inputs) -> Result<Datum> + Send + Sync + 'static,
    {
        let kind = GetterKind::Composed {
            dependencies: dependencies.into_iter().collect(),
            combiner: Box::new(combiner),
        };
        Self::build(kind, store)
    }

    fn build(kind: GetterKind, store: Option<Store>) -> Self {
        Self {
            inner: Arc::new(GetterInner {
                id: GetterId::new(),
                kind,
                store,
            }),
        }
    }

    /// Identity used by the call-site cache.
    pub fn id(&self) -> GetterId {
        self.inner.id
    }

    /// The store this getter was defined on.
    pub fn store(&self) -> Option<&Store> {
        self.inner.store.as_ref()
    }

    /// Whether this getter was built by composition.
    pub fn is_composed(&self) -> bool {
        matches!(self.inner.kind, GetterKind::Composed { .. })
    }

    /// Number of declared dependencies; 0 for direct getters.
    pub fn dependency_count(&self) -> usize {
        match &self.inner.kind {
            GetterKind::Direct(_) => 0,
            GetterKind::Composed { dependencies, .. } => dependencies.len(),
        }
    }

    /// Evaluate against a state node, raw or guarded.
    ///
    /// Errors from any dependency or from the combiner propagate unchanged;
    /// later dependencies are not evaluated once one fails.
    pub fn evaluate(&self, state: &Node) -> Result<Datum> {
        match &self.inner.kind {
            GetterKind::Direct(accessor) => accessor(state),
            GetterKind::Composed {
                dependencies,
                combiner,
            } => {
                let values = if dependencies.is_empty() {
                    vec![Datum::Node(state.clone())]
                } else {
                    dependencies
                        .iter()
                        .map(|dependency| dependency.evaluate(state))
                        .collect::<Result<Vec<_>>>()?
                };
                combiner(&Inputs {
                    values,
                    store: self.inner.store.clone(),
                })
            }
        }
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter")
            .field("id", &self.inner.id)
            .field("composed", &self.is_composed())
            .field("dependencies", &self.dependency_count())
            .field("store", &self.store().map(Store::id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    fn state() -> Node {
        Node::from_value(json!({ "data": { "codes": { "a": 2 } }, "status": 1 }))
    }

    #[test]
    fn composed_getters_chain() {
        let get_codes = Getter::compose(
            [Getter::direct(|s| s.get("data"))],
            |inputs| inputs[0].get("codes"),
        );
        let get_code_a = Getter::compose([get_codes], |inputs| inputs[0].get("a"));
        let get_sum = Getter::compose(
            [Getter::direct(|s| s.get("status")), get_code_a],
            |inputs| {
                let status = inputs[0].as_i64().unwrap_or_default();
                let a = inputs[1].as_i64().unwrap_or_default();
                Ok(Datum::from(status + a))
            },
        );

        assert_eq!(get_sum.evaluate(&state()).unwrap(), Datum::from(3));
        assert_eq!(get_sum.dependency_count(), 2);
    }

    #[test]
    fn zero_dependencies_receive_the_state() {
        let root = state();
        let whole = Getter::compose([], |inputs| Ok(inputs[0].clone()));
        let direct = Getter::direct(|s| Ok(Datum::Node(s.clone())));

        assert_eq!(whole.evaluate(&root).unwrap(), Datum::Node(root.clone()));
        assert_eq!(whole.evaluate(&root).unwrap(), direct.evaluate(&root).unwrap());
        assert!(whole.is_composed());
        assert!(!direct.is_composed());
    }

    #[test]
    fn dependencies_run_in_order_against_the_same_state() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let first_log = log.clone();
        let second_log = log.clone();

        let first = Getter::direct(move |s| {
            first_log.lock().push(("first", s.path()));
            Ok(Datum::from(1))
        });
        let second = Getter::direct(move |s| {
            second_log.lock().push(("second", s.path()));
            Ok(Datum::from(2))
        });
        let pair = Getter::compose([first, second], |inputs| {
            Ok(Datum::from(json!([inputs[0].as_i64(), inputs[1].as_i64()])))
        });

        let data = state().get("data").unwrap().into_node().unwrap();
        assert_eq!(pair.evaluate(&data).unwrap(), Datum::from(json!([1, 2])));
        assert_eq!(
            *log.lock(),
            vec![("first", "data".to_string()), ("second", "data".to_string())]
        );
    }

    #[test]
    fn dependency_failure_stops_evaluation() {
        let combined = Arc::new(AtomicI32::new(0));
        let later = Arc::new(AtomicI32::new(0));
        let combined_clone = combined.clone();
        let later_clone = later.clone();

        let failing = Getter::direct(|_| Err(StoreError::failed("broken dependency")));
        let after = Getter::direct(move |_| {
            later_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Datum::from(0))
        });
        let getter = Getter::compose([failing, after], move |_| {
            combined_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Datum::from(0))
        });

        assert_eq!(
            getter.evaluate(&state()),
            Err(StoreError::failed("broken dependency"))
        );
        assert_eq!(later.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(combined.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn getters_read_raw_and_guarded_state_alike() {
        let get_a = Getter::compose(
            [Getter::direct(|s| s.get("data"))],
            |inputs| inputs[0].get("codes")?.get("a"),
        );
        let root = state();

        assert_eq!(get_a.evaluate(&root).unwrap(), Datum::from(2));
        assert_eq!(get_a.evaluate(&root.freeze()).unwrap(), Datum::from(2));
    }

    #[test]
    fn unbound_getters_have_no_store() {
        let getter = Getter::compose([], |inputs| Ok(inputs[0].clone()));
        assert!(getter.store().is_none());
        assert_eq!(getter.clone().id(), getter.id());
    }
}
