//! # Simply Configuration
//!
//! YAML configuration parser for simply platforms.
//!
//! A configuration file declares named platforms. Each platform selects a
//! backend and a frontend by name, lists its hosts, optionally declares script
//! operations, and carries any number of extra keys that are handed untouched
//! to the chosen backend and frontend.

#![warn(missing_docs)]

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod parser;
pub mod resolver;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Platform reference not found
    #[error("Platform '{0}' not found")]
    PlatformNotFound(String),

    /// Malformed `key=value` override
    #[error("Invalid override '{0}': expected key=value")]
    InvalidOverride(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Order in which platforms are set up; declaration order when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequence: Vec<String>,

    /// Platform definitions, in declaration order
    pub platforms: IndexMap<String, PlatformSpec>,
}

impl Config {
    /// Look up a platform by name
    pub fn platform(&self, name: &str) -> Result<&PlatformSpec> {
        self.platforms
            .get(name)
            .ok_or_else(|| ConfigError::PlatformNotFound(name.to_string()))
    }

    /// Platform names in setup order
    pub fn setup_order(&self) -> Vec<&str> {
        if self.sequence.is_empty() {
            self.platforms.keys().map(String::as_str).collect()
        } else {
            self.sequence.iter().map(String::as_str).collect()
        }
    }
}

/// One platform: a backend, a frontend and the hosts they manage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformSpec {
    /// Backend name, resolved through the provider registry
    pub backend: String,

    /// Frontend name, resolved through the provider registry
    pub frontend: String,

    /// Host identifier to address (container name, IP, VM id)
    #[serde(default)]
    pub hosts: IndexMap<String, String>,

    /// Script operations added to the platform's baseline operations
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub operations: IndexMap<String, OperationSpec>,

    /// Backend- and frontend-specific keys, passed through untouched
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl PlatformSpec {
    /// Create a platform spec with no hosts and no options
    pub fn new(backend: impl Into<String>, frontend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            frontend: frontend.into(),
            hosts: IndexMap::new(),
            operations: IndexMap::new(),
            options: Map::new(),
        }
    }

    /// Add a host
    pub fn with_host(mut self, id: impl Into<String>, address: impl Into<String>) -> Self {
        self.hosts.insert(id.into(), address.into());
        self
    }

    /// Add a pass-through option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Add a script operation
    pub fn with_operation(mut self, name: impl Into<String>, operation: OperationSpec) -> Self {
        self.operations.insert(name.into(), operation);
        self
    }

    /// Raw pass-through option
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Pass-through option as a string, if it is one
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// Copy of this spec with `key=value` overrides applied.
    ///
    /// Keys may address one nested level with a dot (`hosts.h1=addr`). Values
    /// are parsed as YAML scalars, so `true`, `3` and `null` keep their types.
    pub fn with_overrides<'a, I>(&self, overrides: I) -> Result<PlatformSpec>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut tree = serde_json::to_value(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        for (key, value) in overrides {
            let Some(root) = tree.as_object_mut() else {
                break;
            };
            match key.split_once('.') {
                Some((parent, child)) => {
                    let slot = root
                        .entry(parent.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    match slot.as_object_mut() {
                        Some(object) => {
                            object.insert(child.to_string(), value);
                        }
                        None => {
                            return Err(ConfigError::ValidationError(format!(
                                "cannot override '{key}': '{parent}' is not a mapping"
                            )));
                        }
                    }
                }
                None => {
                    root.insert(key.to_string(), value);
                }
            }
        }

        serde_json::from_value(tree).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// A baseline operation implemented by a shell command template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationSpec {
    /// Command template; `{name}` placeholders take quoted keyword arguments
    pub command: String,

    /// Aggregation policy name (`map`, `append`, `all_true`, ...)
    #[serde(default = "default_policy")]
    pub policy: String,

    /// What each host contributes to the aggregated result
    #[serde(default)]
    pub output: OutputKind,

    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OperationSpec {
    /// Create a script operation with the `map` policy and stdout output
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            policy: default_policy(),
            output: OutputKind::default(),
            description: None,
        }
    }

    /// Set the aggregation policy name
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = policy.into();
        self
    }

    /// Set the per-host output kind
    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }
}

fn default_policy() -> String {
    "map".to_string()
}

/// Per-host result of a script operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// The command's stdout as text
    #[default]
    Stdout,
    /// `true` when the command exits with code 0
    Status,
    /// Nothing (`null`); the command must succeed
    None,
}
