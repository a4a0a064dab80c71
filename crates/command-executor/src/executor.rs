//! Process execution with concurrent capture of both output streams

use async_process::{ChildStdin, Command as ProcessCommand, Stdio};
use futures_lite::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::debug;

use crate::command::Command;
use crate::echo::{ConsoleEcho, Echo, LogSource};
use crate::error::{Error, Result};

/// Outcome of one process invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    /// Everything the process wrote to stdout
    pub stdout: String,
    /// Everything the process wrote to stderr
    pub stderr: String,
    /// Exit code; `128 + n` when the process was killed by signal `n`
    pub exit_code: i32,
}

impl CommandResult {
    /// Returns true if the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout split into lines, without terminators
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

/// Per-invocation options
#[derive(Clone, Default)]
pub struct ExecOptions {
    echo: Option<Arc<dyn Echo>>,
    input: Option<Vec<u8>>,
    raise_on_failure: bool,
    context: Option<String>,
}

impl ExecOptions {
    /// Options with no echo, no input and no failure on nonzero exit
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror every output line to the console with the given prefix
    pub fn echo_prefix(self, prefix: impl Into<String>) -> Self {
        self.with_echo(Arc::new(ConsoleEcho::new(prefix)))
    }

    /// Mirror every output line to a custom sink
    pub fn with_echo(mut self, echo: Arc<dyn Echo>) -> Self {
        self.echo = Some(echo);
        self
    }

    /// Data written to the process's stdin, which is then closed
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Turn a nonzero exit code into [`Error::ExecutionFailed`]
    pub fn raise_on_failure(mut self, raise: bool) -> Self {
        self.raise_on_failure = raise;
        self
    }

    /// Host or other identifier reported in logs and errors
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The configured context, if any
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Whether stdin data is configured
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("echo", &self.echo.is_some())
            .field("input_len", &self.input.as_ref().map(Vec::len))
            .field("raise_on_failure", &self.raise_on_failure)
            .field("context", &self.context)
            .finish()
    }
}

/// Runs shell command lines to completion
///
/// Both output pipes are drained by two independent readers polled together
/// with the exit wait, so a process filling one pipe while the other is idle
/// can never block on us.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    shell: String,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ProcessExecutor {
    /// Create an executor running commands through `sh -c`
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor using another POSIX shell (e.g. `bash`)
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// The shell used to interpret command lines
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Render a [`Command`] and execute it
    pub async fn run(&self, command: &Command, options: &ExecOptions) -> Result<CommandResult> {
        self.execute(&command.to_shell_string(), options).await
    }

    /// Execute one shell command line and capture its output.
    ///
    /// A nonzero exit is reported through [`CommandResult::exit_code`] unless
    /// the options ask for [`ExecOptions::raise_on_failure`].
    pub async fn execute(&self, command: &str, options: &ExecOptions) -> Result<CommandResult> {
        debug!(command, context = options.context(), "executing");

        let stdin = if options.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut child = ProcessCommand::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::spawn_failed(format!("{} -c <{}>: {}", self.shell, command, e)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::spawn_failed("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::spawn_failed("stderr was not captured"))?;
        let echo = options.echo.as_deref();

        let (fed, out, err, status) = futures::join!(
            feed_input(stdin, options.input.as_deref()),
            drain(stdout, LogSource::Stdout, echo),
            drain(stderr, LogSource::Stderr, echo),
            child.status(),
        );
        fed?;

        let result = CommandResult {
            stdout: out?,
            stderr: err?,
            exit_code: exit_code(status?),
        };
        debug!(
            command,
            context = options.context(),
            exit_code = result.exit_code,
            "command finished"
        );

        if options.raise_on_failure && !result.success() {
            return Err(Error::execution_failed(
                command,
                options.context.clone(),
                &result.stderr,
                result.exit_code,
            ));
        }
        Ok(result)
    }
}

/// Execute a command line with the default `sh` executor
pub async fn execute(command: &str, options: &ExecOptions) -> Result<CommandResult> {
    ProcessExecutor::default().execute(command, options).await
}

/// Write all input then close stdin. A process that exits without reading
/// its input closes the pipe early, which is not an error.
async fn feed_input(stdin: Option<ChildStdin>, input: Option<&[u8]>) -> std::io::Result<()> {
    let (Some(mut pipe), Some(data)) = (stdin, input) else {
        return Ok(());
    };
    let written = match pipe.write_all(data).await {
        Ok(()) => pipe.close().await,
        Err(e) => Err(e),
    };
    match written {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Read one pipe to EOF line by line, echoing each line as it arrives.
async fn drain<R>(pipe: R, source: LogSource, echo: Option<&dyn Echo>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut captured = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if let Some(echo) = echo {
            echo.line(source, &String::from_utf8_lossy(&line));
        }
        captured.extend_from_slice(&line);
    }

    Ok(String::from_utf8_lossy(&captured).into_owned())
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_debug_hides_payload() {
        let options = ExecOptions::new()
            .with_input("secret")
            .with_context("h1")
            .raise_on_failure(true);
        let shown = format!("{options:?}");
        assert!(shown.contains("input_len: Some(6)"));
        assert!(!shown.contains("secret"));
        assert!(options.has_input());
        assert_eq!(options.context(), Some("h1"));
    }

    #[test]
    fn test_result_helpers() {
        let result = CommandResult {
            stdout: "a\nb\n".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(result.success());
        assert_eq!(result.stdout_lines().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[smol_potat::test]
    async fn test_echo_hello() {
        let result = execute("echo hello", &ExecOptions::new()).await.unwrap();
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "");
        assert_eq!(result.exit_code, 0);
    }
}
