//! Ordered collection of registered metric plugins.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::PluginsConfig;
use crate::plugins::{LoadAvgPlugin, MemPlugin, MetricPlugin, SwapPlugin};

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Plugin name must not be empty")]
    EmptyName,

    #[error("Plugin {0:?} is already registered")]
    DuplicateName(String),
}

/// Plugins queried by the updater, in registration order.
///
/// Built once at startup and then shared read-only behind an `Arc`.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn MetricPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in plugins enabled in the configuration.
    pub fn from_config(config: &PluginsConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        if config.loadavg {
            registry.register(LoadAvgPlugin::new())?;
        }
        if config.mem {
            registry.register(MemPlugin::new())?;
        }
        if config.swap {
            registry.register(SwapPlugin::new())?;
        }
        Ok(registry)
    }

    /// Append a plugin. Names must be non-empty and unique.
    pub fn register<P>(&mut self, plugin: P) -> Result<(), RegistryError>
    where
        P: MetricPlugin + 'static,
    {
        self.register_shared(Arc::new(plugin))
    }

    /// Append a plugin that is already behind an `Arc`.
    pub fn register_shared(&mut self, plugin: Arc<dyn MetricPlugin>) -> Result<(), RegistryError> {
        let name = plugin.name();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.plugins.iter().any(|p| p.name() == name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        tracing::debug!(plugin = %name, "Plugin registered");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MetricPlugin>> {
        self.plugins.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}
