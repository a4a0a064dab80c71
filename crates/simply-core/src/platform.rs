//! Platforms: a host set driven by one backend and one frontend
//!
//! Names resolve in a fixed order: the platform's own baseline operations and
//! attributes, then the backend, then the frontend. The first owner wins.

use command_executor::{CommandResult, ExecOptions, shell};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use simply_config::{OperationSpec, OutputKind};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::backends::{Backend, ResetMode};
use crate::capability::{Args, CapabilitySet, Operation};
use crate::fanout::{Dispatched, FanOut};
use crate::frontends::Frontend;
use crate::hosts::{Host, HostSet};
use crate::policy::AggregationPolicy;
use crate::{Error, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Baseline attributes every platform answers
pub const BASELINE_ATTRIBUTES: [&str; 4] = ["name", "backend", "frontend", "hosts"];

/// Lifecycle state of a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformState {
    /// Composed, nothing done yet
    Constructed,
    /// Images or equivalent are available
    Ready,
    /// Hosts are started
    Running,
    /// Reset; a fresh composition is needed
    TornDown,
}

impl fmt::Display for PlatformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Constructed => "constructed",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::TornDown => "torn down",
        })
    }
}

/// Owner of a resolved name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// The platform's baseline
    Platform,
    /// The backend
    Backend,
    /// The frontend
    Frontend,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Platform => "platform",
            Self::Backend => "backend",
            Self::Frontend => "frontend",
        })
    }
}

/// Outcome of a name lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    /// An operation and its owner
    Operation {
        /// Owner
        provider: Provider,
        /// Operation metadata
        operation: &'a Operation,
    },
    /// An attribute value and its owner
    Attribute {
        /// Owner
        provider: Provider,
        /// Current value
        value: Value,
    },
}

impl Resolved<'_> {
    /// Owner of the resolved name
    pub fn provider(&self) -> Provider {
        match self {
            Self::Operation { provider, .. } | Self::Attribute { provider, .. } => *provider,
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptOperation {
    command: String,
    output: OutputKind,
}

/// A composed platform
pub struct Platform {
    name: String,
    hosts: HostSet,
    backend: Box<dyn Backend>,
    frontend: Box<dyn Frontend>,
    baseline: CapabilitySet,
    scripts: IndexMap<String, ScriptOperation>,
    state: PlatformState,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("name", &self.name)
            .field("backend", &self.backend.type_name())
            .field("frontend", &self.frontend.type_name())
            .field("hosts", &self.hosts)
            .field("state", &self.state)
            .finish()
    }
}

impl Platform {
    /// Compose a platform from its parts; it starts out `Constructed`
    pub fn new(
        name: impl Into<String>,
        hosts: HostSet,
        backend: Box<dyn Backend>,
        frontend: Box<dyn Frontend>,
    ) -> Self {
        let baseline = CapabilitySet::new("platform").with_operation(
            "address",
            AggregationPolicy::Map,
            "Address of the host",
        );
        Self {
            name: name.into(),
            hosts,
            backend,
            frontend,
            baseline,
            scripts: IndexMap::new(),
            state: PlatformState::Constructed,
        }
    }

    /// Add a baseline operation implemented by a command template
    pub fn add_script_operation(&mut self, name: &str, spec: &OperationSpec) -> Result<()> {
        let policy = spec.policy.parse::<AggregationPolicy>()?;
        let description = spec
            .description
            .clone()
            .unwrap_or_else(|| format!("Runs `{}`", spec.command));
        self.baseline
            .register(Operation::new(name, policy, description))?;
        self.scripts.insert(
            name.to_string(),
            ScriptOperation {
                command: spec.command.clone(),
                output: spec.output,
            },
        );
        Ok(())
    }

    /// Platform name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hosts in fan-out order
    pub fn hosts(&self) -> &HostSet {
        &self.hosts
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlatformState {
        self.state
    }

    /// The backend
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// The frontend
    pub fn frontend(&self) -> &dyn Frontend {
        self.frontend.as_ref()
    }

    fn baseline_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name.clone())),
            "backend" => Some(Value::String(self.backend.type_name().to_string())),
            "frontend" => Some(Value::String(self.frontend.type_name().to_string())),
            "hosts" => serde_json::to_value(&self.hosts).ok(),
            _ => None,
        }
    }

    fn not_found(&self, name: &str) -> Error {
        Error::CapabilityNotFound {
            name: name.to_string(),
            platform: self.name.clone(),
            backend: self.backend.type_name().to_string(),
            frontend: self.frontend.type_name().to_string(),
        }
    }

    /// Resolve a name across the platform, the backend and the frontend
    pub fn lookup(&self, name: &str) -> Result<Resolved<'_>> {
        if let Some(operation) = self.baseline.get(name) {
            return Ok(Resolved::Operation {
                provider: Provider::Platform,
                operation,
            });
        }
        if let Some(value) = self.baseline_attribute(name) {
            return Ok(Resolved::Attribute {
                provider: Provider::Platform,
                value,
            });
        }
        if let Some(operation) = self.backend.capabilities().get(name) {
            return Ok(Resolved::Operation {
                provider: Provider::Backend,
                operation,
            });
        }
        if let Some(value) = self.backend.attribute(name) {
            return Ok(Resolved::Attribute {
                provider: Provider::Backend,
                value,
            });
        }
        if let Some(operation) = self.frontend.capabilities().get(name) {
            return Ok(Resolved::Operation {
                provider: Provider::Frontend,
                operation,
            });
        }
        if let Some(value) = self.frontend.attribute(name) {
            return Ok(Resolved::Attribute {
                provider: Provider::Frontend,
                value,
            });
        }
        Err(self.not_found(name))
    }

    /// Value of an attribute
    pub fn attribute(&self, name: &str) -> Result<Value> {
        match self.lookup(name)? {
            Resolved::Attribute { value, .. } => Ok(value),
            Resolved::Operation { .. } => Err(self.not_found(name)),
        }
    }

    /// Every reachable operation in lookup order; shadowed ones are left out
    pub fn operations(&self) -> Vec<(Provider, &Operation)> {
        let mut seen = BTreeSet::new();
        let sets = [
            (Provider::Platform, &self.baseline),
            (Provider::Backend, self.backend.capabilities()),
            (Provider::Frontend, self.frontend.capabilities()),
        ];
        let mut operations = Vec::new();
        for (provider, set) in sets {
            for operation in set.operations() {
                if seen.insert(operation.name.as_str()) {
                    operations.push((provider, operation));
                }
            }
        }
        operations
    }

    fn ensure_usable(&self, action: &str) -> Result<()> {
        if self.state == PlatformState::TornDown {
            return Err(Error::InvalidState {
                platform: self.name.clone(),
                state: self.state.to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    /// Call an operation for one host, or for every host merged by its
    /// policy. An attribute name returns the attribute value.
    pub async fn call(
        &self,
        name: &str,
        host: Option<&str>,
        args: &Args,
    ) -> Result<Dispatched<'_, Platform, Value>> {
        self.ensure_usable(&format!("call '{name}'"))?;

        let (provider, policy) = match self.lookup(name)? {
            Resolved::Attribute { value, .. } => {
                if let Some(id) = host.filter(|id| !self.hosts.contains(id)) {
                    return Err(Error::unknown_host(id));
                }
                return Ok(Dispatched::Single(value));
            }
            Resolved::Operation {
                provider,
                operation,
            } => (provider, operation.policy),
        };
        debug!(platform = %self.name, operation = name, %provider, %policy, "call");

        FanOut::new(self, &self.hosts)
            .dispatch(host, policy, |h| self.invoke_on(provider, name, h, args))
            .await
    }

    async fn invoke_on(
        &self,
        provider: Provider,
        name: &str,
        host: Host<'_>,
        args: &Args,
    ) -> Result<Value> {
        match provider {
            Provider::Platform => self.invoke_baseline(name, host, args).await,
            Provider::Backend => self.backend.invoke(name, host, args).await,
            Provider::Frontend => {
                self.frontend
                    .invoke(self.backend.as_ref(), name, host, args)
                    .await
            }
        }
    }

    async fn invoke_baseline(&self, name: &str, host: Host<'_>, args: &Args) -> Result<Value> {
        if name == "address" {
            return Ok(Value::String(host.address.to_string()));
        }
        let script = self.scripts.get(name).ok_or_else(|| self.not_found(name))?;
        let command = render_template(name, &script.command, args)?;
        let strict = ExecOptions::new()
            .raise_on_failure(true)
            .with_context(host.id);

        match script.output {
            OutputKind::Stdout => {
                let result = self.backend.run_command(host, &command, strict).await?;
                Ok(Value::String(result.stdout))
            }
            OutputKind::Status => Ok(Value::Bool(
                self.backend.test_command(host, &command).await?,
            )),
            OutputKind::None => {
                self.backend.run_command(host, &command, strict).await?;
                Ok(Value::Null)
            }
        }
    }

    /// Run a shell command on one host or on every host (`Map`)
    pub async fn run_command(
        &self,
        command: &str,
        host: Option<&str>,
        options: ExecOptions,
    ) -> Result<Dispatched<'_, Platform, CommandResult>> {
        self.ensure_usable("run a command")?;
        FanOut::new(self, &self.hosts)
            .dispatch(host, AggregationPolicy::Map, |h| {
                self.backend.run_command(h, command, options.clone())
            })
            .await
    }

    /// Whether a command succeeds on one host, or on every host (`AllTrue`)
    pub async fn test_command(&self, command: &str, host: Option<&str>) -> Result<bool> {
        self.ensure_usable("test a command")?;
        let outcome = FanOut::new(self, &self.hosts)
            .dispatch(host, AggregationPolicy::AllTrue, |h| {
                self.backend.test_command(h, command)
            })
            .await?;
        Ok(outcome.truthy().unwrap_or(false))
    }

    /// Make hosts startable, after an optional reset
    pub async fn prepare(&mut self, reset: Option<ResetMode>) -> Result<()> {
        self.ensure_usable("prepare")?;
        info!(platform = %self.name, backend = self.backend.type_name(), "preparing");
        self.backend.prepare(&self.hosts, reset).await?;
        if reset.is_some() || self.state == PlatformState::Constructed {
            self.state = PlatformState::Ready;
        }
        Ok(())
    }

    /// Start every host; the platform must be prepared
    pub async fn start(&mut self) -> Result<()> {
        self.ensure_usable("start")?;
        if self.state == PlatformState::Constructed {
            return Err(Error::InvalidState {
                platform: self.name.clone(),
                state: self.state.to_string(),
                action: "start before prepare".to_string(),
            });
        }
        info!(platform = %self.name, hosts = self.hosts.len(), "starting hosts");
        self.backend.start(&self.hosts).await?;
        self.state = PlatformState::Running;
        Ok(())
    }

    /// Prepare then start
    pub async fn setup(&mut self, reset: Option<ResetMode>) -> Result<()> {
        self.prepare(reset).await?;
        self.start().await
    }

    /// Reset hosts; the platform cannot be used afterwards
    pub async fn reset(&mut self, mode: ResetMode) -> Result<()> {
        self.ensure_usable("reset")?;
        info!(platform = %self.name, %mode, "resetting");
        self.backend.reset(&self.hosts, mode).await?;
        self.state = PlatformState::TornDown;
        Ok(())
    }

    /// Stop and delete hosts
    pub async fn teardown(&mut self) -> Result<()> {
        self.reset(ResetMode::RmContainer).await
    }
}

/// Fill `{name}` placeholders with shell-quoted keyword arguments
pub fn render_template(operation: &str, template: &str, args: &Args) -> Result<String> {
    let mut problems = Vec::new();

    let rendered = PLACEHOLDER.replace_all(template, |cap: &regex::Captures<'_>| {
        let key = &cap[1];
        match args.get(key) {
            Some(Value::String(s)) => shell::quote(s).into_owned(),
            Some(value @ (Value::Number(_) | Value::Bool(_))) => value.to_string(),
            Some(_) => {
                problems.push(format!("'{key}' must be a string, number or boolean"));
                String::new()
            }
            None => {
                problems.push(format!("missing argument '{key}'"));
                String::new()
            }
        }
    });

    if !problems.is_empty() {
        return Err(Error::invalid_argument(operation, problems.join(", ")));
    }
    Ok(rendered.into_owned())
}
