//! Backends: how hosts are created, reached and destroyed

use async_trait::async_trait;
use command_executor::{CommandResult, ExecOptions, shell};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

use crate::capability::{Args, CapabilitySet, optional_bool, optional_str, required_str};
use crate::hosts::{Host, HostSet};
use crate::policy::AggregationPolicy;
use crate::{Error, Result};

pub mod docker;
pub mod local;

pub use docker::DockerBackend;
pub use local::LocalBackend;

/// How far a reset goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Stop running hosts
    Stop,
    /// Stop and delete hosts
    RmContainer,
    /// Stop and delete hosts, then delete their images
    RmImage,
    /// Delete images together with every container created from them
    Uproot,
}

impl ResetMode {
    /// Canonical textual name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::RmContainer => "rm_container",
            Self::RmImage => "rm_image",
            Self::Uproot => "uproot",
        }
    }
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stop" => Ok(Self::Stop),
            "rm_container" => Ok(Self::RmContainer),
            "rm_image" => Ok(Self::RmImage),
            "uproot" => Ok(Self::Uproot),
            other => Err(Error::configuration(format!(
                "unknown reset mode '{other}' (expected stop, rm_container, rm_image or uproot)"
            ))),
        }
    }
}

/// Host lifecycle and command transport for a platform
#[async_trait]
pub trait Backend: Send + Sync {
    /// Registered name of this backend type
    fn type_name(&self) -> &str;

    /// Operations this backend provides
    fn capabilities(&self) -> &CapabilitySet;

    /// Backend attribute, if defined
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Run a shell command on one host
    async fn run_command(
        &self,
        host: Host<'_>,
        command: &str,
        options: ExecOptions,
    ) -> Result<CommandResult>;

    /// Whether a command exits with code 0 on one host
    async fn test_command(&self, host: Host<'_>, command: &str) -> Result<bool> {
        Ok(self
            .run_command(host, command, ExecOptions::new())
            .await?
            .success())
    }

    /// Invoke one of this backend's operations on one host
    async fn invoke(&self, operation: &str, host: Host<'_>, args: &Args) -> Result<Value>;

    /// Make hosts startable (build or pull images), after an optional reset
    async fn prepare(&self, _hosts: &HostSet, _reset: Option<ResetMode>) -> Result<()> {
        Ok(())
    }

    /// Start every host that is not running
    async fn start(&self, _hosts: &HostSet) -> Result<()> {
        Ok(())
    }

    /// Stop or destroy hosts
    async fn reset(&self, _hosts: &HostSet, _mode: ResetMode) -> Result<()> {
        Ok(())
    }
}

/// Operations every backend provides on top of [`Backend::run_command`]
pub(crate) fn command_capabilities(provider: &str) -> CapabilitySet {
    CapabilitySet::new(provider)
        .with_operation(
            "run_command",
            AggregationPolicy::Map,
            "Run a shell command; args: command, input",
        )
        .with_operation(
            "test_command",
            AggregationPolicy::AllTrue,
            "Whether a shell command succeeds; args: command",
        )
        .with_operation(
            "path_exists",
            AggregationPolicy::AllTrue,
            "Whether a path exists; args: path",
        )
        .with_operation(
            "get_data",
            AggregationPolicy::Map,
            "Content of a file; args: path",
        )
        .with_operation(
            "put_data",
            AggregationPolicy::CollapseSelf,
            "Write data to a file; args: path, data, append",
        )
}

/// Serialize a command result for the operation interface
pub fn result_to_value(result: &CommandResult) -> Value {
    json!({
        "stdout": result.stdout,
        "stderr": result.stderr,
        "exit_code": result.exit_code,
    })
}

/// Options that raise on failure with the host as context
pub(crate) fn strict(host: Host<'_>) -> ExecOptions {
    ExecOptions::new()
        .raise_on_failure(true)
        .with_context(host.id)
}

/// Shared implementation of the [`command_capabilities`] operations.
///
/// Returns `None` for any other operation name.
pub(crate) async fn invoke_command_operation(
    backend: &dyn Backend,
    operation: &str,
    host: Host<'_>,
    args: &Args,
) -> Result<Option<Value>> {
    let value = match operation {
        "run_command" => {
            let command = required_str(args, operation, "command")?;
            let mut options = ExecOptions::new();
            if let Some(input) = optional_str(args, operation, "input")? {
                options = options.with_input(input);
            }
            let result = backend.run_command(host, command, options).await?;
            result_to_value(&result)
        }
        "test_command" => {
            let command = required_str(args, operation, "command")?;
            Value::Bool(backend.test_command(host, command).await?)
        }
        "path_exists" => {
            let path = required_str(args, operation, "path")?;
            let command = format!("test -e {}", shell::quote(path));
            Value::Bool(backend.test_command(host, &command).await?)
        }
        "get_data" => {
            let path = required_str(args, operation, "path")?;
            let command = format!("cat {}", shell::quote(path));
            let result = backend.run_command(host, &command, strict(host)).await?;
            Value::String(result.stdout)
        }
        "put_data" => {
            let path = required_str(args, operation, "path")?;
            let data = required_str(args, operation, "data")?;
            let redirect = if optional_bool(args, operation, "append", false)? {
                ">>"
            } else {
                ">"
            };
            let command = format!("cat {redirect} {}", shell::quote(path));
            backend
                .run_command(host, &command, strict(host).with_input(data))
                .await?;
            Value::Null
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_mode_names() {
        for mode in [
            ResetMode::Stop,
            ResetMode::RmContainer,
            ResetMode::RmImage,
            ResetMode::Uproot,
        ] {
            assert_eq!(mode.as_str().parse::<ResetMode>().unwrap(), mode);
        }
        assert!("rm".parse::<ResetMode>().is_err());
    }

    #[test]
    fn test_result_to_value() {
        let result = CommandResult {
            stdout: "out".into(),
            stderr: "err".into(),
            exit_code: 2,
        };
        assert_eq!(
            result_to_value(&result),
            json!({"stdout": "out", "stderr": "err", "exit_code": 2})
        );
    }
}
