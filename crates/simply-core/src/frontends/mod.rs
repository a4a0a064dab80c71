//! Frontends: OS-family specific operations inside hosts
//!
//! Frontends keep no per-host state. Every command they issue goes through
//! the platform's backend, which they receive on each call.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::backends::Backend;
use crate::capability::{Args, CapabilitySet};
use crate::hosts::Host;

pub mod unix;

pub use unix::{Family, UnixFrontend};

/// OS-family operations for a platform
#[async_trait]
pub trait Frontend: Send + Sync {
    /// Registered name of this frontend type
    fn type_name(&self) -> &str;

    /// Operations this frontend provides
    fn capabilities(&self) -> &CapabilitySet;

    /// Frontend attribute, if defined
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Invoke one of this frontend's operations on one host
    async fn invoke(
        &self,
        backend: &dyn Backend,
        operation: &str,
        host: Host<'_>,
        args: &Args,
    ) -> Result<Value>;
}
