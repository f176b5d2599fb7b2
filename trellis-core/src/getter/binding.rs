//! Reactive bindings handed to consumers.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;
use crate::reactive::{Computed, PullFn};
use crate::state::Datum;
use crate::store::{Action, Completion};

/// A read-only reactive value over a getter.
///
/// Each binding wraps its own [`Computed`], but bindings of the same getter
/// (or the same factory and cacheable arguments) share one pull function.
#[derive(Clone)]
pub struct ReactiveValue {
    computed: Computed<Datum>,
}

impl ReactiveValue {
    pub(crate) fn new(pull: PullFn<Datum>) -> Self {
        Self {
            computed: Computed::from_pull(pull),
        }
    }

    /// Current value. Recomputes if the store changed since the last read.
    pub fn get(&self) -> Result<Datum> {
        self.computed.get()
    }

    /// Current value as a plain snapshot.
    pub fn value(&self) -> Result<Value> {
        self.get()?.to_value()
    }

    /// Whether both bindings are backed by the same pull function.
    pub fn shares_pull_with(&self, other: &ReactiveValue) -> bool {
        Arc::ptr_eq(self.computed.pull(), other.computed.pull())
    }

    /// The underlying computed value.
    pub fn computed(&self) -> &Computed<Datum> {
        &self.computed
    }
}

impl fmt::Debug for ReactiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReactiveValue").field(&self.computed).finish()
    }
}

/// A two-way binding: reads go through the getter, writes through an
/// action.
///
/// Writing the same value as the previous write through this binding is a
/// no-op; the comparison is against the last written value, not the value
/// currently read.
pub struct WritableValue {
    value: ReactiveValue,
    action: Action,
    extra_args: Vec<Value>,
    last_written: Mutex<Option<Value>>,
}

impl WritableValue {
    pub(crate) fn new(value: ReactiveValue, action: Action, extra_args: Vec<Value>) -> Self {
        Self {
            value,
            action,
            extra_args,
            last_written: Mutex::new(None),
        }
    }

    /// Current value.
    pub fn get(&self) -> Result<Datum> {
        self.value.get()
    }

    /// The read side of this binding.
    pub fn reader(&self) -> &ReactiveValue {
        &self.value
    }

    /// Write a value by dispatching the action with `value` followed by the
    /// extra arguments given at bind time.
    ///
    /// Returns `Ok(None)` when the write was coalesced with the previous one.
    /// A dispatch that fails is not a write: the baseline stays where it was,
    /// so retrying the same value dispatches again.
    pub fn set(&self, value: impl Into<Value>) -> Result<Option<Completion>> {
        let value = value.into();
        let previous = {
            let mut last = self.last_written.lock();
            if last.as_ref() == Some(&value) {
                tracing::trace!(action = self.action.name(), "coalesced repeated write");
                return Ok(None);
            }
            last.replace(value.clone())
        };

        let mut args = Vec::with_capacity(1 + self.extra_args.len());
        args.push(value);
        args.extend(self.extra_args.iter().cloned());
        match self.action.call(args) {
            Ok(completion) => Ok(Some(completion)),
            Err(err) => {
                *self.last_written.lock() = previous;
                Err(err)
            }
        }
    }
}

impl fmt::Debug for WritableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableValue")
            .field("value", &self.value)
            .field("action", &self.action.name())
            .field("extra_args", &self.extra_args)
            .finish()
    }
}
