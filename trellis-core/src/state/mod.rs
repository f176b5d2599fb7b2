//! State Trees
//!
//! Store state is a `serde_json::Value` tree living in a shared cell. Nothing
//! outside this module touches the tree directly; everything goes through
//! [`Node`] handles, which resolve their path on each access and enforce the
//! getter guard on each write.
//!
//! Every cell is a reactive source. Raw writes bump the cell's version, which
//! is what invalidates computed values that read from it. Tracking is per
//! cell: any write to a store invalidates every value that read that store.

mod cell;
mod datum;
mod node;

pub use cell::MutationEvent;
pub use datum::Datum;
pub use node::{Node, Segment};

pub(crate) use cell::{MutationListener, StateCell};
