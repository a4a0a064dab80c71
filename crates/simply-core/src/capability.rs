//! Named operation sets exposed by platforms and providers
//!
//! Every operation takes a host identifier first; further keyword arguments
//! travel as a JSON object ([`Args`]) and are forwarded unchanged to each
//! per-host invocation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::policy::AggregationPolicy;
use crate::{Error, Result};

/// Keyword arguments of an operation call
pub type Args = Map<String, Value>;

/// Metadata about an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name
    pub name: String,

    /// How per-host results are merged when no host is named
    pub policy: AggregationPolicy,

    /// Human-readable description
    pub description: String,
}

impl Operation {
    /// Create a new operation descriptor
    pub fn new(
        name: impl Into<String>,
        policy: AggregationPolicy,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            description: description.into(),
        }
    }
}

/// Ordered set of operations owned by one provider
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    provider: String,
    operations: IndexMap<String, Operation>,
}

impl CapabilitySet {
    /// Create an empty set for the named provider
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            operations: IndexMap::new(),
        }
    }

    /// Builder-style registration of a provider's built-in operation
    pub fn with_operation(
        mut self,
        name: impl Into<String>,
        policy: AggregationPolicy,
        description: impl Into<String>,
    ) -> Self {
        let operation = Operation::new(name, policy, description);
        self.operations.insert(operation.name.clone(), operation);
        self
    }

    /// Register an operation, refusing duplicates
    pub fn register(&mut self, operation: Operation) -> Result<()> {
        if self.operations.contains_key(&operation.name) {
            return Err(Error::configuration(format!(
                "operation '{}' already registered by {}",
                operation.name, self.provider
            )));
        }
        self.operations.insert(operation.name.clone(), operation);
        Ok(())
    }

    /// Name of the provider owning this set
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Get operation metadata
    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Check if an operation exists
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Operations in registration order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Required string argument
pub fn required_str<'a>(args: &'a Args, operation: &str, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::invalid_argument(
            operation,
            format!("'{key}' must be a string, got {other}"),
        )),
        None => Err(Error::invalid_argument(
            operation,
            format!("missing argument '{key}'"),
        )),
    }
}

/// Optional string argument; `null` counts as absent
pub fn optional_str<'a>(args: &'a Args, operation: &str, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(args, operation, key).map(Some),
    }
}

/// Optional boolean argument with a default
pub fn optional_bool(args: &Args, operation: &str, key: &str, default: bool) -> Result<bool> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(Error::invalid_argument(
            operation,
            format!("'{key}' must be a boolean, got {other}"),
        )),
    }
}

/// A string or a list of strings; never empty
pub fn string_list(args: &Args, operation: &str, key: &str) -> Result<Vec<String>> {
    let items = match args.get(key) {
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(Error::invalid_argument(
                    operation,
                    format!("'{key}' items must be strings, got {other}"),
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(Error::invalid_argument(
                operation,
                format!("'{key}' must be a string or a list, got {other}"),
            ));
        }
        None => Vec::new(),
    };

    if items.is_empty() {
        return Err(Error::invalid_argument(
            operation,
            format!("missing argument '{key}'"),
        ));
    }
    Ok(items)
}
