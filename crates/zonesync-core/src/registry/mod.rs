//! Plugin-based backend registry
//!
//! The registry allows DNS backends to be registered dynamically at runtime,
//! avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::BackendRegistry;
//! use zonesync_core::config::BackendConfig;
//!
//! // Registry with the memory and file backends
//! let registry = BackendRegistry::with_builtin();
//!
//! // Register an out-of-tree backend
//! registry.register_backend("my-dns", Box::new(MyDnsFactory));
//!
//! // Create backend from config
//! let backend = registry.create_backend(&BackendConfig::Memory).await?;
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::backend::{DnsBackend, DnsBackendFactory, FileBackend, MemoryBackend};
use crate::config::BackendConfig;
use crate::error::{Error, Result};

/// Backend registry for plugin-based backend creation
///
/// The registry maintains a map of backend type names to factory objects,
/// allowing dynamic instantiation of backends based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct BackendRegistry {
    /// Registered backend factories
    backends: RwLock<HashMap<String, Arc<dyn DnsBackendFactory>>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` backends registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_backend("memory", Box::new(MemoryBackendFactory));
        registry.register_backend("file", Box::new(FileBackendFactory));
        registry
    }

    /// Register a backend factory
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_backend(&self, name: impl Into<String>, factory: Box<dyn DnsBackendFactory>) {
        let mut backends = self.backends.write().unwrap_or_else(|e| e.into_inner());
        backends.insert(name.into(), Arc::from(factory));
    }

    /// Create a backend from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsBackend>)`: Created backend instance
    /// - `Err(Error)`: If the backend type is not registered or creation fails
    pub async fn create_backend(&self, config: &BackendConfig) -> Result<Box<dyn DnsBackend>> {
        let backend_type = config.type_name();

        let factory = {
            let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
            backends
                .get(backend_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown backend type: {}", backend_type)))?
        };

        factory.create(config).await
    }

    /// List all registered backend types
    pub fn list_backends(&self) -> Vec<String> {
        let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a backend type is registered
    pub fn has_backend(&self, name: &str) -> bool {
        let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
        backends.contains_key(name)
    }
}

/// Builds [`MemoryBackend`]s
///
/// A `custom` config may list zones to serve:
/// `{"view": "default", "zones": ["example.com", "10.0.0.0/8"]}`.
struct MemoryBackendFactory;

#[async_trait]
impl DnsBackendFactory for MemoryBackendFactory {
    async fn create(&self, config: &BackendConfig) -> Result<Box<dyn DnsBackend>> {
        match config {
            BackendConfig::Memory => Ok(Box::new(MemoryBackend::new())),
            BackendConfig::Custom { config, .. } => {
                let view = config
                    .get("view")
                    .and_then(|v| v.as_str())
                    .unwrap_or("default");
                let zones: Vec<String> = match config.get("zones") {
                    Some(zones) => serde_json::from_value(zones.clone())?,
                    None => Vec::new(),
                };
                Ok(Box::new(MemoryBackend::with_zones(view, zones)))
            }
            other => Err(Error::config(format!(
                "memory backend cannot be built from a '{}' config",
                other.type_name()
            ))),
        }
    }
}

/// Builds [`FileBackend`]s
struct FileBackendFactory;

#[async_trait]
impl DnsBackendFactory for FileBackendFactory {
    async fn create(&self, config: &BackendConfig) -> Result<Box<dyn DnsBackend>> {
        match config {
            BackendConfig::File { path } => Ok(Box::new(FileBackend::new(path).await?)),
            other => Err(Error::config(format!(
                "file backend cannot be built from a '{}' config",
                other.type_name()
            ))),
        }
    }
}
