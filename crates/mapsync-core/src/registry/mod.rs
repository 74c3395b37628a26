//! Plugin-based source and store registry
//!
//! The registry allows source clients and record stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mapsync_core::registry::SourceRegistry;
//! use mapsync_core::config::SourceConfig;
//!
//! // Create a registry that knows the built-in stores
//! let registry = SourceRegistry::with_builtin_stores();
//!
//! // Register sources
//! mapsync_source_notion::register(&registry);
//!
//! // Create a client from config
//! let config = SourceConfig::notion("secret", "db-1");
//! let client = registry.create_source(&config)?;
//! ```
//!
//! ## Registration
//!
//! Source crates register themselves during initialization:
//!
//! ```rust,ignore
//! # use mapsync_core::registry::SourceRegistry;
//! // In mapsync-source-notion crate
//! pub fn register(registry: &SourceRegistry) {
//!     registry.register_source("notion", Box::new(NotionSourceFactory));
//! }
//! ```

use crate::config::{SourceConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::state::{MemoryRecordStoreFactory, SqliteRecordStoreFactory};
use crate::traits::{RecordStore, RecordStoreFactory, SourceClient, SourceClientFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry for plugin-based source client and record store creation
///
/// The registry maintains a map of type names to factory objects,
/// allowing dynamic instantiation based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct SourceRegistry {
    /// Registered source client factories
    sources: RwLock<HashMap<String, Box<dyn SourceClientFactory>>>,

    /// Registered record store factories
    stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `sqlite` stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryRecordStoreFactory));
        registry.register_store("sqlite", Box::new(SqliteRecordStoreFactory));
        registry
    }

    /// Register a source client factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "notion")
    /// - `factory`: Factory object for creating client instances
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn SourceClientFactory>) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a record store factory
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn RecordStoreFactory>) {
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a source client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn SourceClient>)`: Created client instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn SourceClient>> {
        let source_type = config.type_name();
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create one client per configured source, in order
    pub fn create_sources(&self, configs: &[SourceConfig]) -> Result<Vec<Box<dyn SourceClient>>> {
        configs.iter().map(|config| self.create_source(config)).collect()
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
