//! Getter Factories
//!
//! A factory turns call-time arguments into a getter, e.g. "the item with
//! this id". Factories themselves are not cached; the pull functions built
//! from them are, keyed by the factory identity and the arguments.
//!
//! # Cache keys
//!
//! Arguments are plain values, refs ([`Signal`]s), or callbacks. A call is
//! cacheable when every argument dereferences to a primitive. Its key is the
//! comma-joined display form of those primitives: `1,true,x` for
//! `(1, true, "x")`. Objects, arrays and callbacks have no stable key, so a
//! call carrying one gets a fresh pull function every time.
//!
//! The key is computed once per call, but refs are dereferenced again on
//! every evaluation, so a cached binding keeps following its refs.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

use super::cache::{evaluate_bound, new_lru, CacheStats, Counters};
use super::Getter;
use crate::error::{Result, StoreError};
use crate::reactive::{PullFn, Signal};
use crate::state::Datum;

/// Unique identifier for a getter factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactoryId(u64);

impl FactoryId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A function-valued factory argument.
pub type Callback = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// An argument passed to [`Registry::bind_factory`](crate::Registry::bind_factory).
#[derive(Clone)]
pub enum FactoryArg {
    /// Plain value.
    Value(Value),
    /// Ref, dereferenced on every evaluation.
    Ref(Signal<Value>),
    /// Callback; never cacheable.
    Callback(Callback),
}

/// A dereferenced factory argument.
#[derive(Clone)]
pub enum Resolved {
    /// Value, or the current value of a ref.
    Value(Value),
    /// Callback argument.
    Callback(Callback),
}

fn is_primitive(value: &Value) -> bool {
    !(value.is_object() || value.is_array())
}

fn key_part(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FactoryArg {
    /// Wrap a callback argument.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Key fragment, or `None` when this argument cannot be part of a key.
    /// Reads refs without tracking.
    fn cache_key_part(&self) -> Option<String> {
        match self {
            FactoryArg::Value(value) if is_primitive(value) => Some(key_part(value)),
            FactoryArg::Ref(signal) => {
                let value = signal.get_untracked();
                is_primitive(&value).then(|| key_part(&value))
            }
            FactoryArg::Value(_) | FactoryArg::Callback(_) => None,
        }
    }

    /// Dereference, tracking refs in the current reactive context.
    fn resolve(&self) -> Resolved {
        match self {
            FactoryArg::Value(value) => Resolved::Value(value.clone()),
            FactoryArg::Ref(signal) => Resolved::Value(signal.get()),
            FactoryArg::Callback(callback) => Resolved::Callback(Arc::clone(callback)),
        }
    }
}

impl From<Value> for FactoryArg {
    fn from(value: Value) -> Self {
        FactoryArg::Value(value)
    }
}

impl From<Signal<Value>> for FactoryArg {
    fn from(signal: Signal<Value>) -> Self {
        FactoryArg::Ref(signal)
    }
}

impl From<&Signal<Value>> for FactoryArg {
    fn from(signal: &Signal<Value>) -> Self {
        FactoryArg::Ref(signal.clone())
    }
}

macro_rules! factory_arg_from_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FactoryArg {
                fn from(value: $ty) -> Self {
                    FactoryArg::Value(Value::from(value))
                }
            }
        )*
    };
}

factory_arg_from_primitive!(bool, i32, i64, u32, u64, f64, String, &str);

impl fmt::Debug for FactoryArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryArg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FactoryArg::Ref(signal) => f.debug_tuple("Ref").field(signal).finish(),
            FactoryArg::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Cache key for a call, or `None` when the call must always recompute.
pub(crate) fn cache_key(args: &[FactoryArg]) -> Option<String> {
    let parts = args
        .iter()
        .map(FactoryArg::cache_key_part)
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join(","))
}

/// Dereferenced arguments handed to a factory.
pub struct FactoryArgs {
    items: Vec<Resolved>,
}

impl FactoryArgs {
    fn resolve(args: &[FactoryArg]) -> Self {
        Self {
            items: args.iter().map(FactoryArg::resolve).collect(),
        }
    }

    /// The value at `index`, if that argument is not a callback.
    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.items.get(index)? {
            Resolved::Value(value) => Some(value),
            Resolved::Callback(_) => None,
        }
    }

    /// The callback at `index`, if that argument is one.
    pub fn callback(&self, index: usize) -> Option<&Callback> {
        match self.items.get(index)? {
            Resolved::Callback(callback) => Some(callback),
            Resolved::Value(_) => None,
        }
    }
}

impl Deref for FactoryArgs {
    type Target = [Resolved];

    fn deref(&self) -> &[Resolved] {
        &self.items
    }
}

type Produce = dyn Fn(&FactoryArgs) -> Getter + Send + Sync;

/// A function from call-time arguments to a getter.
#[derive(Clone)]
pub struct Factory {
    id: FactoryId,
    produce: Arc<Produce>,
}

impl Factory {
    /// Wrap a getter-producing function.
    pub fn new<F>(produce: F) -> Self
    where
        F: Fn(&FactoryArgs) -> Getter + Send + Sync + 'static,
    {
        Self {
            id: FactoryId::new(),
            produce: Arc::new(produce),
        }
    }

    /// Identity used by the factory cache.
    pub fn id(&self) -> FactoryId {
        self.id
    }

    /// Produce a getter for the given arguments, dereferencing refs.
    pub fn produce(&self, args: &[FactoryArg]) -> Getter {
        (self.produce)(&FactoryArgs::resolve(args))
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").field("id", &self.id).finish()
    }
}

fn factory_pull(factory: Factory, args: Vec<FactoryArg>) -> PullFn<Datum> {
    Arc::new(move || -> Result<Datum> {
        let getter = factory.produce(&args);
        let store = getter
            .store()
            .cloned()
            .ok_or(StoreError::UnboundGetter(getter.id()))?;
        evaluate_bound(&getter, &store)
    })
}

/// Two-level cache: factory identity, then argument key.
pub(crate) struct FactoryCache {
    capacity: Option<NonZeroUsize>,
    entries: Mutex<HashMap<FactoryId, LruCache<String, PullFn<Datum>>>>,
    counters: Counters,
}

impl FactoryCache {
    pub(crate) fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub(crate) fn pull_for(&self, factory: &Factory, args: Vec<FactoryArg>) -> PullFn<Datum> {
        let Some(key) = cache_key(&args) else {
            self.counters.bypass();
            tracing::debug!(factory = factory.id.raw(), "factory arguments are not cacheable");
            return factory_pull(factory.clone(), args);
        };

        let mut entries = self.entries.lock();
        let keyed = entries
            .entry(factory.id)
            .or_insert_with(|| new_lru(self.capacity));
        if let Some(pull) = keyed.get(&key) {
            self.counters.hit();
            tracing::trace!(factory = factory.id.raw(), key = %key, "factory cache hit");
            return Arc::clone(pull);
        }

        let pull = factory_pull(factory.clone(), args);
        keyed.put(key.clone(), Arc::clone(&pull));
        self.counters.miss();
        tracing::debug!(factory = factory.id.raw(), key = %key, "factory cache miss");
        pull
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().values().map(LruCache::len).sum();
        self.counters.snapshot(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitive_arguments_form_a_key() {
        let args: Vec<FactoryArg> = vec![1.into(), true.into(), "x".into(), Value::Null.into()];
        assert_eq!(cache_key(&args).as_deref(), Some("1,true,x,null"));
        assert_eq!(cache_key(&[]).as_deref(), Some(""));
        assert_eq!(cache_key(&[1.5.into()]).as_deref(), Some("1.5"));
    }

    #[test]
    fn refs_holding_primitives_are_keyed_by_value() {
        let page = Signal::new(json!(3));
        assert_eq!(cache_key(&[(&page).into(), "p".into()]).as_deref(), Some("3,p"));

        page.set(json!({ "n": 3 }));
        assert_eq!(cache_key(&[(&page).into()]), None);
    }

    #[test]
    fn composite_arguments_are_not_cacheable() {
        assert_eq!(cache_key(&[json!({ "id": 1 }).into()]), None);
        assert_eq!(cache_key(&[1.into(), json!([1, 2]).into()]), None);
        assert_eq!(cache_key(&[FactoryArg::callback(|_| Value::Null)]), None);
    }

    #[test]
    fn resolved_arguments_follow_refs() {
        let page = Signal::new(json!(1));
        let args = vec![FactoryArg::from(&page), FactoryArg::callback(|a| a[0].clone())];

        let resolved = FactoryArgs::resolve(&args);
        assert_eq!(resolved.value(0), Some(&json!(1)));
        assert!(resolved.callback(1).is_some());
        assert!(resolved.value(1).is_none());
        assert_eq!(resolved.len(), 2);

        page.set(json!(2));
        assert_eq!(FactoryArgs::resolve(&args).value(0), Some(&json!(2)));
    }
}
