//! Error types for simply-core

use thiserror::Error;

/// Result type alias for simply-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    /// A command failed, or could not be run at all
    #[error(transparent)]
    Execution(#[from] command_executor::Error),

    /// Neither the platform nor its providers define the requested name
    #[error(
        "platform '{platform}' has no attribute or operation '{name}' \
         (backend: {backend}, frontend: {frontend})"
    )]
    CapabilityNotFound {
        /// Requested attribute or operation
        name: String,
        /// Platform name
        platform: String,
        /// Backend type name
        backend: String,
        /// Frontend type name
        frontend: String,
    },

    /// No host has the given address
    #[error("no host with address '{address}'")]
    HostNotFound {
        /// Address that was looked up
        address: String,
    },

    /// An explicit host is not part of the host set
    #[error("unknown host '{host}'")]
    UnknownHost {
        /// Requested host identifier
        host: String,
    },

    /// Malformed configuration or unknown provider
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(#[from] simply_config::ConfigError),

    /// Unknown aggregation policy name
    #[error("invalid aggregation policy '{0}'")]
    InvalidPolicy(String),

    /// Missing or mistyped keyword argument
    #[error("invalid argument for '{operation}': {message}")]
    InvalidArgument {
        /// Operation being called
        operation: String,
        /// What is wrong
        message: String,
    },

    /// Lifecycle violation
    #[error("platform '{platform}' is {state}: cannot {action}")]
    InvalidState {
        /// Platform name
        platform: String,
        /// Current state
        state: String,
        /// Refused step
        action: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an unknown host error
    pub fn unknown_host(host: impl Into<String>) -> Self {
        Self::UnknownHost { host: host.into() }
    }

    /// Exit code of a failed command, if this error carries one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Execution(e) => e.exit_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_not_found_names_providers() {
        let err = Error::CapabilityNotFound {
            name: "frobnicate".into(),
            platform: "web".into(),
            backend: "docker".into(),
            frontend: "debian".into(),
        };
        let message = err.to_string();
        assert!(message.contains("'frobnicate'"));
        assert!(message.contains("'web'"));
        assert!(message.contains("docker"));
        assert!(message.contains("debian"));
    }

    #[test]
    fn test_execution_error_keeps_exit_code() {
        let err: Error =
            command_executor::Error::execution_failed("false", Some("h1".into()), "", 1).into();
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().contains("on h1"));
    }
}
