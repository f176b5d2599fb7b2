//! Error types shared by every layer of the crate.

use thiserror::Error;

use crate::getter::GetterId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Broad classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation touched something it must not: a guarded view or a
    /// disposed store. Always fatal to the operation, never retried.
    Reference,

    /// A getter chain or an action body failed while running.
    Evaluation,

    /// The registry was configured with invalid input.
    Configuration,
}

/// Errors produced by getters, bindings, and actions.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A write was attempted through a guarded (immutable) view.
    #[error("Mutations in getters are not allowed.")]
    MutationInGetter,

    /// An action was dispatched after its store was disposed.
    #[error("Failed to dispatch action on disposed store")]
    DisposedStore {
        /// Id of the disposed store.
        store: String,
    },

    /// A getter without a store was handed to the binding layer.
    #[error("getter {0:?} is not bound to a store")]
    UnboundGetter(GetterId),

    /// A property was read from `null`.
    #[error("cannot read property '{key}' of null")]
    NullAccess {
        /// The key that was requested.
        key: String,
    },

    /// A node points at a path that no longer exists in its state tree.
    #[error("state path '{path}' no longer exists")]
    StalePath {
        /// Rendered path of the node.
        path: String,
    },

    /// A value had the wrong shape for the requested operation.
    #[error("value at '{path}' is not {expected}")]
    TypeMismatch {
        /// Rendered path of the offending value.
        path: String,
        /// What the operation needed.
        expected: &'static str,
    },

    /// Invalid registry configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failure raised by user code (a combiner or an action body).
    #[error("{0}")]
    Failed(String),
}

impl StoreError {
    /// Build an error for user code to return from a combiner or action.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MutationInGetter | Self::DisposedStore { .. } => ErrorKind::Reference,
            Self::Config(_) => ErrorKind::Configuration,
            Self::UnboundGetter(_)
            | Self::NullAccess { .. }
            | Self::StalePath { .. }
            | Self::TypeMismatch { .. }
            | Self::Failed(_) => ErrorKind::Evaluation,
        }
    }
}
