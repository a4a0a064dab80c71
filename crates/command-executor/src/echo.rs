//! Live mirroring of process output

use std::io::Write;
use std::sync::Mutex;

/// Source of an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Sink receiving every line of process output as soon as it is read.
///
/// Lines are passed with their trailing newline (when the process wrote one),
/// so concatenating everything a sink received for one source reproduces the
/// captured stream byte for byte.
pub trait Echo: Send + Sync {
    /// Called once per line read from `source`
    fn line(&self, source: LogSource, line: &str);
}

/// Writes each line to the matching console stream, prefixed
#[derive(Debug, Clone)]
pub struct ConsoleEcho {
    prefix: String,
}

impl ConsoleEcho {
    /// Create a console echo with the given line prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix written before every line
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Echo for ConsoleEcho {
    fn line(&self, source: LogSource, line: &str) {
        // Console write failures must not abort the command being mirrored
        let _ = match source {
            LogSource::Stdout => write_prefixed(&mut std::io::stdout().lock(), &self.prefix, line),
            LogSource::Stderr => write_prefixed(&mut std::io::stderr().lock(), &self.prefix, line),
        };
    }
}

fn write_prefixed(out: &mut impl Write, prefix: &str, line: &str) -> std::io::Result<()> {
    out.write_all(prefix.as_bytes())?;
    out.write_all(line.as_bytes())?;
    out.flush()
}

/// Collects what would have been shown on the console
///
/// Useful in tests and wherever output must be mirrored somewhere other than
/// the terminal.
#[derive(Debug, Default)]
pub struct BufferedEcho {
    prefix: String,
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

impl BufferedEcho {
    /// Create an empty buffer with the given line prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Everything echoed for stdout, prefixes included
    pub fn stdout(&self) -> String {
        self.stdout.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Everything echoed for stderr, prefixes included
    pub fn stderr(&self) -> String {
        self.stderr.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Echoed text for `source` with the per-line prefix removed
    pub fn unprefixed(&self, source: LogSource) -> String {
        let text = match source {
            LogSource::Stdout => self.stdout(),
            LogSource::Stderr => self.stderr(),
        };
        text.split_inclusive('\n')
            .map(|line| line.strip_prefix(self.prefix.as_str()).unwrap_or(line))
            .collect()
    }
}

impl Echo for BufferedEcho {
    fn line(&self, source: LogSource, line: &str) {
        let buffer = match source {
            LogSource::Stdout => &self.stdout,
            LogSource::Stderr => &self.stderr,
        };
        if let Ok(mut buffer) = buffer.lock() {
            buffer.push_str(&self.prefix);
            buffer.push_str(line);
        }
    }
}
