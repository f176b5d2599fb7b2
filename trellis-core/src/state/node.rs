//! State Nodes
//!
//! A [`Node`] is a handle to one position in a state tree. It never owns or
//! copies the tree: every read resolves the node's path against live state,
//! so a node obtained earlier always reflects the current contents.
//!
//! Nodes come in two flavors sharing one type:
//!
//! - **raw** nodes, handed out by [`Store::state`](crate::Store::state),
//!   which actions use to mutate state;
//! - **guarded** nodes, produced by [`Node::freeze`], which getters receive.
//!   Reading a child of a guarded node yields a guarded node again, at any
//!   depth, and every mutating call fails with
//!   [`StoreError::MutationInGetter`].
//!
//! The guard is checked on the write itself, so it holds no matter who
//! performs the write.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use smallvec::SmallVec;

use super::cell::StateCell;
use super::datum::Datum;
use crate::error::{Result, StoreError};
use crate::reactive::ReactiveContext;

/// One step of a node path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

type Path = SmallVec<[Segment; 4]>;

/// Handle to a position in a state tree.
#[derive(Clone)]
pub struct Node {
    cell: Arc<StateCell>,
    path: Path,
    guarded: bool,
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn resolve<'a>(root: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, segment| match segment {
        Segment::Key(key) => value.get(key.as_str()),
        Segment::Index(index) => value.get(*index),
    })
}

fn resolve_mut<'a>(root: &'a mut Value, path: &[Segment]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |value, segment| match segment {
        Segment::Key(key) => value.get_mut(key.as_str()),
        Segment::Index(index) => value.get_mut(*index),
    })
}

fn render(path: &[Segment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            Segment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

impl Node {
    /// Create a raw node over a standalone state tree.
    pub fn from_value(value: Value) -> Self {
        Self::root(Arc::new(StateCell::new("", value)))
    }

    pub(crate) fn root(cell: Arc<StateCell>) -> Self {
        Self {
            cell,
            path: Path::new(),
            guarded: false,
        }
    }

    /// A guarded view over the same position.
    ///
    /// Reads through the view behave exactly like reads through `self`;
    /// writes fail with [`StoreError::MutationInGetter`].
    pub fn freeze(&self) -> Node {
        Node {
            guarded: true,
            ..self.clone()
        }
    }

    /// The raw node behind a guarded view. Identity, not a copy.
    pub(crate) fn unguard(&self) -> Node {
        Node {
            guarded: false,
            ..self.clone()
        }
    }

    /// Whether writes through this node are rejected.
    pub fn is_guarded(&self) -> bool {
        self.guarded
    }

    /// Rendered path of this node, `""` for the root.
    pub fn path(&self) -> String {
        render(&self.path)
    }

    /// Id of the reactive source this node reads from.
    pub fn source_id(&self) -> u64 {
        self.cell.source
    }

    fn child(&self, segment: Segment) -> Node {
        let mut path = self.path.clone();
        path.push(segment);
        Node {
            cell: Arc::clone(&self.cell),
            path,
            guarded: self.guarded,
        }
    }

    fn stale(&self) -> StoreError {
        StoreError::StalePath { path: self.path() }
    }

    fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> Result<R> {
        ReactiveContext::track_dependency(self.cell.source);
        let root = self.cell.root.read();
        let value = resolve(&root, &self.path).ok_or_else(|| self.stale())?;
        Ok(f(value))
    }

    fn lift(&self, child: Option<&Value>, segment: impl FnOnce() -> Segment) -> Datum {
        match child {
            Some(value) if is_container(value) => Datum::Node(self.child(segment())),
            Some(value) => Datum::Value(value.clone()),
            None => Datum::Value(Value::Null),
        }
    }

    /// Read an object property.
    ///
    /// Objects and arrays come back as child nodes with this node's guard
    /// flag; primitives come back by value; a missing key reads as `null`.
    pub fn get(&self, key: &str) -> Result<Datum> {
        self.read(|value| self.lift(value.get(key), || Segment::Key(key.to_owned())))
    }

    /// Read an array element, with the same rules as [`Node::get`].
    pub fn at(&self, index: usize) -> Result<Datum> {
        self.read(|value| self.lift(value.get(index), || Segment::Index(index)))
    }

    /// Snapshot of the value at this position.
    pub fn value(&self) -> Result<Value> {
        self.read(Value::clone)
    }

    /// Deserialize the value at this position.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.value()?;
        serde_json::from_value(value).map_err(|_| StoreError::TypeMismatch {
            path: self.path(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Number of keys or elements; 0 for primitives.
    pub fn len(&self) -> Result<usize> {
        self.read(|value| match value {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        })
    }

    /// Whether [`Node::len`] is 0.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Object keys; empty for arrays and primitives.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.read(|value| {
            value
                .as_object()
                .map(|map| map.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn write<R>(&self, f: impl FnOnce(&mut Value, &str) -> Result<R>) -> Result<R> {
        if self.guarded {
            return Err(StoreError::MutationInGetter);
        }
        let path = self.path();
        let out = {
            let mut root = self.cell.root.write();
            let target = resolve_mut(&mut root, &self.path).ok_or_else(|| self.stale())?;
            f(target, &path)?
        };
        self.cell.changed(path);
        Ok(out)
    }

    /// Set an object property.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.write(|target, path| match target.as_object_mut() {
            Some(map) => {
                map.insert(key.to_owned(), value);
                Ok(())
            }
            None => Err(StoreError::TypeMismatch {
                path: path.to_owned(),
                expected: "an object",
            }),
        })
    }

    /// Remove an object property, returning its old value.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.write(|target, path| match target.as_object_mut() {
            Some(map) => Ok(map.remove(key)),
            None => Err(StoreError::TypeMismatch {
                path: path.to_owned(),
                expected: "an object",
            }),
        })
    }

    /// Append to an array.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.write(|target, path| match target.as_array_mut() {
            Some(items) => {
                items.push(value);
                Ok(())
            }
            None => Err(StoreError::TypeMismatch {
                path: path.to_owned(),
                expected: "an array",
            }),
        })
    }

    /// Replace the whole value at this position.
    pub fn replace(&self, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        self.write(|target, _| Ok(std::mem::replace(target, value)))
    }

    /// Mutate the value at this position.
    ///
    /// `f` runs on a copy with no lock held, so it may read the store; the
    /// copy is then swapped in, replacing anything `f` wrote at this
    /// position through other nodes.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Result<R> {
        if self.guarded {
            return Err(StoreError::MutationInGetter);
        }
        let mut value = {
            let root = self.cell.root.read();
            resolve(&root, &self.path).cloned().ok_or_else(|| self.stale())?
        };
        let out = f(&mut value);
        self.write(|target, _| {
            *target = value;
            Ok(out)
        })
    }

    /// Whether both nodes point at the same position of the same tree.
    pub fn same_position(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell) && self.path == other.path
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.same_position(other) && self.guarded == other.guarded
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("store", &self.cell.label)
            .field("path", &self.path())
            .field("guarded", &self.guarded)
            .finish()
    }
}
