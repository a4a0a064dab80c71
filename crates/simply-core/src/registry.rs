//! Registry of backend and frontend factories
//!
//! Maps provider names used in configuration files to constructors. Every
//! composition builds fresh provider instances owned by its platform.

use indexmap::IndexMap;
use simply_config::{Config, PlatformSpec};
use std::sync::Arc;
use tracing::info;

use crate::backends::{Backend, DockerBackend, LocalBackend};
use crate::frontends::{Family, Frontend, UnixFrontend};
use crate::hosts::HostSet;
use crate::platform::Platform;
use crate::{Error, Result};

/// Constructor for a backend
pub type BackendFactory = Arc<dyn Fn(&PlatformSpec) -> Result<Box<dyn Backend>> + Send + Sync>;

/// Constructor for a frontend
pub type FrontendFactory = Arc<dyn Fn(&PlatformSpec) -> Result<Box<dyn Frontend>> + Send + Sync>;

/// Registry that manages provider factories
#[derive(Clone)]
pub struct ProviderRegistry {
    backends: IndexMap<String, BackendFactory>,
    frontends: IndexMap<String, FrontendFactory>,
}

impl ProviderRegistry {
    /// Create a registry with the built-in providers
    pub fn new() -> Self {
        let mut registry = Self::empty();

        // Register default providers
        registry.register_backend("docker", |spec| {
            Ok(Box::new(DockerBackend::from_spec(spec)?) as Box<dyn Backend>)
        });
        registry.register_backend("local", |spec| {
            Ok(Box::new(LocalBackend::from_spec(spec)?) as Box<dyn Backend>)
        });
        for family in [Family::Debian, Family::Alpine] {
            registry.register_frontend(family.as_str(), move |_| {
                Ok(Box::new(UnixFrontend::new(family)) as Box<dyn Frontend>)
            });
        }

        registry
    }

    /// Create a registry with no providers
    pub fn empty() -> Self {
        Self {
            backends: IndexMap::new(),
            frontends: IndexMap::new(),
        }
    }

    /// Register a backend factory, replacing any factory of the same name
    pub fn register_backend<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&PlatformSpec) -> Result<Box<dyn Backend>> + Send + Sync + 'static,
    {
        self.backends.insert(name.to_string(), Arc::new(factory));
    }

    /// Register a frontend factory, replacing any factory of the same name
    pub fn register_frontend<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&PlatformSpec) -> Result<Box<dyn Frontend>> + Send + Sync + 'static,
    {
        self.frontends.insert(name.to_string(), Arc::new(factory));
    }

    /// Registered backend names
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// Registered frontend names
    pub fn frontend_names(&self) -> Vec<&str> {
        self.frontends.keys().map(String::as_str).collect()
    }

    /// Construct the backend a spec names
    pub fn create_backend(&self, spec: &PlatformSpec) -> Result<Box<dyn Backend>> {
        let factory = self.backends.get(&spec.backend).ok_or_else(|| {
            Error::configuration(format!(
                "unknown backend '{}' (known: {})",
                spec.backend,
                self.backend_names().join(", ")
            ))
        })?;
        factory(spec)
    }

    /// Construct the frontend a spec names
    pub fn create_frontend(&self, spec: &PlatformSpec) -> Result<Box<dyn Frontend>> {
        let factory = self.frontends.get(&spec.frontend).ok_or_else(|| {
            Error::configuration(format!(
                "unknown frontend '{}' (known: {})",
                spec.frontend,
                self.frontend_names().join(", ")
            ))
        })?;
        factory(spec)
    }

    /// Compose a platform from its spec
    pub fn compose(&self, name: &str, spec: &PlatformSpec) -> Result<Platform> {
        let backend = self.create_backend(spec)?;
        let frontend = self.create_frontend(spec)?;
        let hosts = HostSet::from(spec.hosts.clone());

        let mut platform = Platform::new(name, hosts, backend, frontend);
        for (operation, script) in &spec.operations {
            platform.add_script_operation(operation, script)?;
        }

        info!(
            platform = name,
            backend = %spec.backend,
            frontend = %spec.frontend,
            hosts = spec.hosts.len(),
            "composed platform"
        );
        Ok(platform)
    }

    /// Compose the platform of a configuration by name
    pub fn compose_from(&self, config: &Config, name: &str) -> Result<Platform> {
        self.compose(name, config.platform(name)?)
    }

    /// Compose every platform of a configuration in setup order
    pub fn compose_all(&self, config: &Config) -> Result<Vec<Platform>> {
        config
            .setup_order()
            .into_iter()
            .map(|name| self.compose_from(config, name))
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
