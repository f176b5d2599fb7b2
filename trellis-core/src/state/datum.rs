//! Values flowing through getters.

use serde_json::Value;

use super::node::Node;
use crate::error::{Result, StoreError};

/// A getter input or output.
///
/// Either a detached value (a primitive read out of state, or anything a
/// combiner built) or a [`Node`] pointing into state.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Detached value.
    Value(Value),
    /// Live position in a state tree.
    Node(Node),
}

impl Datum {
    /// Read a property.
    ///
    /// On a node this is [`Node::get`]. On a detached object it looks the key
    /// up; on other detached primitives it reads as `null`. Reading from
    /// `null` fails with [`StoreError::NullAccess`].
    pub fn get(&self, key: &str) -> Result<Datum> {
        match self {
            Datum::Node(node) => node.get(key),
            Datum::Value(Value::Null) => Err(StoreError::NullAccess {
                key: key.to_owned(),
            }),
            Datum::Value(value) => Ok(Datum::Value(value.get(key).cloned().unwrap_or(Value::Null))),
        }
    }

    /// Read an array element, with the same rules as [`Datum::get`].
    pub fn at(&self, index: usize) -> Result<Datum> {
        match self {
            Datum::Node(node) => node.at(index),
            Datum::Value(Value::Null) => Err(StoreError::NullAccess {
                key: index.to_string(),
            }),
            Datum::Value(value) => Ok(Datum::Value(value.get(index).cloned().unwrap_or(Value::Null))),
        }
    }

    /// Set a property through a node.
    ///
    /// Fails with [`StoreError::MutationInGetter`] on guarded nodes and with
    /// [`StoreError::TypeMismatch`] on detached values, which have no state
    /// to write to.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        match self {
            Datum::Node(node) => node.set(key, value),
            Datum::Value(_) => Err(StoreError::TypeMismatch {
                path: key.to_owned(),
                expected: "a state node",
            }),
        }
    }

    /// The node, if this is one.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Datum::Node(node) => Some(node),
            Datum::Value(_) => None,
        }
    }

    /// Take the node, if this is one.
    pub fn into_node(self) -> Option<Node> {
        match self {
            Datum::Node(node) => Some(node),
            Datum::Value(_) => None,
        }
    }

    /// The detached value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Datum::Value(value) => Some(value),
            Datum::Node(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Value(Value::Null))
    }

    /// Snapshot as a plain value; nodes are read out of state.
    pub fn to_value(&self) -> Result<Value> {
        match self {
            Datum::Value(value) => Ok(value.clone()),
            Datum::Node(node) => node.value(),
        }
    }

    /// Whether this is a guarded node.
    pub fn is_guarded(&self) -> bool {
        self.as_node().is_some_and(Node::is_guarded)
    }

    /// Drop the guard from a node result; detached values pass through.
    pub(crate) fn unguard(self) -> Datum {
        match self {
            Datum::Node(node) if node.is_guarded() => Datum::Node(node.unguard()),
            other => other,
        }
    }
}

impl From<Node> for Datum {
    fn from(node: Node) -> Self {
        Datum::Node(node)
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

macro_rules! datum_from_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Datum {
                fn from(value: $ty) -> Self {
                    Datum::Value(Value::from(value))
                }
            }
        )*
    };
}

datum_from_primitive!(bool, i32, i64, u32, u64, f64, String, &str);
