//! Runtime-agnostic shell command execution
//!
//! This crate runs shell command lines to completion and captures both output
//! streams without deadlock, optionally feeding stdin, mirroring output live and
//! failing on a nonzero exit code. It is the single place where processes are
//! spawned; everything above it works in terms of [`CommandResult`].

#![warn(missing_docs)]

pub mod command;
pub mod echo;
pub mod error;
pub mod executor;
pub mod shell;

pub use command::{Command, CommandBuilder};
pub use echo::{BufferedEcho, ConsoleEcho, Echo, LogSource};
pub use error::{Error, Result};
pub use executor::{CommandResult, ExecOptions, ProcessExecutor, execute};
