//! Error types for command execution

use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// A command exited with a nonzero code and the caller asked for failure on error
    #[error("error while executing <{command}>{}: [{detail}]", context_suffix(.context))]
    ExecutionFailed {
        /// The command text as given to the shell
        command: String,
        /// Host or other context the command ran against, if known
        context: Option<String>,
        /// Trimmed stderr, or the exit code when stderr was empty
        detail: String,
        /// The exit code of the process
        exit_code: i32,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_deref()
        .map(|c| format!(" on {c}"))
        .unwrap_or_default()
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create an execution failure from the captured process outcome.
    ///
    /// `detail` is stderr with surrounding whitespace removed, falling back to the
    /// exit code so the message is never empty.
    pub fn execution_failed(
        command: impl Into<String>,
        context: Option<String>,
        stderr: &str,
        exit_code: i32,
    ) -> Self {
        let stderr = stderr.trim();
        let detail = if stderr.is_empty() {
            format!("exit code {exit_code}")
        } else {
            stderr.to_string()
        };
        Self::ExecutionFailed {
            command: command.into(),
            context,
            detail,
            exit_code,
        }
    }

    /// Exit code carried by an execution failure
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::ExecutionFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
