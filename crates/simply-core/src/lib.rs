//! Simply Core Library
//!
//! Builds per-test platforms from a pluggable backend (how hosts are created
//! and reached) and a pluggable frontend (OS-family operations), and runs
//! operations against one host or fans them out over every host of a
//! platform, merging results by aggregation policy.

#![warn(missing_docs)]

pub mod backends;
pub mod capability;
pub mod error;
pub mod fanout;
pub mod frontends;
pub mod hosts;
pub mod platform;
pub mod policy;
pub mod registry;
pub mod text;

pub use error::{Error, Result};

/// Convenience prelude for simply-core users
pub mod prelude {
    pub use crate::backends::{Backend, ResetMode};
    pub use crate::capability::{Args, CapabilitySet, Operation};
    pub use crate::error::{Error, Result};
    pub use crate::fanout::{Dispatched, FanOut, Outcome};
    pub use crate::frontends::Frontend;
    pub use crate::hosts::{Host, HostSet};
    pub use crate::platform::{Platform, PlatformState, Provider, Resolved};
    pub use crate::policy::AggregationPolicy;
    pub use crate::registry::ProviderRegistry;

    // Re-export commonly used types from dependencies
    pub use async_trait::async_trait;
    pub use command_executor::{CommandResult, ExecOptions};
    pub use serde_json::{Value, json};
}

// Re-export key types from sibling crates for convenience
pub use command_executor::{CommandResult, ExecOptions};
pub use simply_config::{Config, PlatformSpec};
