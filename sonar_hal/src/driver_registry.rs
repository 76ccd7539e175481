//! Driver registry for pin backends.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving backend
//! factories. Built at startup and consulted once by the binary.

use sonar_common::hal::config::ScannerConfig;
use sonar_common::hal::driver::{DigitalIo, DriverFactory, HalError};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available pin backends.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a backend by name.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no driver with the given name is
    /// registered, or the factory's own error.
    pub fn create_driver(
        &self,
        name: &str,
        config: &ScannerConfig,
    ) -> Result<Arc<dyn DigitalIo>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        factory(config)
    }

    /// List all registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
