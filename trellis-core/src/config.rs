//! Registry Configuration
//!
//! Controls how large the binding caches may grow. Both caches are unbounded
//! unless a capacity is given, in which case the least recently used entry
//! is evicted once the capacity is reached.
//!
//! ```rust,ignore
//! let config = RegistryConfig::from_json(r#"{ "factory_cache_capacity": 256 }"#)?;
//! let registry = Registry::with_config(config);
//! ```

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::error::{Result, StoreError};

/// Settings for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Maximum number of getters with a cached pull function.
    pub getter_cache_capacity: Option<NonZeroUsize>,

    /// Maximum number of argument keys cached per getter factory.
    pub factory_cache_capacity: Option<NonZeroUsize>,
}

impl RegistryConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Bound the getter cache.
    pub fn with_getter_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.getter_cache_capacity = Some(capacity);
        self
    }

    /// Bound each factory's argument cache.
    pub fn with_factory_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.factory_cache_capacity = Some(capacity);
        self
    }
}
