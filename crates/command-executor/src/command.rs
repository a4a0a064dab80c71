//! Command type for building shell command lines

use crate::shell::quote;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A command to be rendered into a shell command line
///
/// Backends and frontends assemble their invocations with this builder instead
/// of formatting strings by hand, so every program argument, environment value
/// and directory is quoted exactly once. Unlike a raw string, a `Command` keeps
/// its parts apart until [`Command::to_shell_string`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The program to execute
    program: String,
    /// The arguments to pass to the program
    args: Vec<String>,
    /// Environment variables to set, rendered as leading assignments
    env: BTreeMap<String, String>,
    /// Working directory for the command
    current_dir: Option<PathBuf>,
    /// Raw shell fragment appended after the quoted arguments
    raw_suffix: Option<String>,
}

impl Command {
    /// Create a new command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            raw_suffix: None,
        }
    }

    /// Add an argument to the command
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env(&mut self, key: impl Into<String>, val: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), val.into());
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<std::path::Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Append an unquoted shell fragment (e.g. a redirection) after the arguments.
    ///
    /// The fragment is emitted verbatim; callers must quote any data they put in it.
    pub fn raw(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.raw_suffix = Some(fragment.into());
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &str {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the environment variables
    pub fn get_envs(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&std::path::Path> {
        self.current_dir.as_deref()
    }

    /// Render the command as a single line for `sh -c`
    pub fn to_shell_string(&self) -> String {
        let mut line = String::new();

        if let Some(dir) = &self.current_dir {
            line.push_str("cd ");
            line.push_str(&quote(&dir.to_string_lossy()));
            line.push_str(" && ");
        }

        for (key, value) in &self.env {
            line.push_str(key);
            line.push('=');
            line.push_str(&quote(value));
            line.push(' ');
        }

        line.push_str(&quote(&self.program));
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }

        if let Some(raw) = &self.raw_suffix {
            line.push(' ');
            line.push_str(raw);
        }

        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Builder pattern helper
impl Command {
    /// Create a builder for this command (for chaining)
    pub fn builder(program: impl Into<String>) -> CommandBuilder {
        CommandBuilder(Command::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add an argument only when `value` is present
    pub fn arg_opt(mut self, flag: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.0.arg(flag).arg(value);
        }
        self
    }

    /// Add an argument only when `condition` holds
    pub fn arg_if(mut self, condition: bool, arg: impl Into<String>) -> Self {
        if condition {
            self.0.arg(arg);
        }
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.args(args);
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.0.env(key, val);
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<std::path::Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Append an unquoted shell fragment
    pub fn raw(mut self, fragment: impl Into<String>) -> Self {
        self.0.raw(fragment);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_creation() {
        let cmd = Command::new("echo");
        assert_eq!(cmd.get_program(), "echo");
        assert_eq!(cmd.get_args().len(), 0);
        assert_eq!(cmd.to_shell_string(), "echo");
    }

    #[test]
    fn test_command_with_args() {
        let mut cmd = Command::new("ls");
        cmd.arg("-la").arg("/tmp");

        assert_eq!(cmd.get_args(), ["-la", "/tmp"]);
        assert_eq!(cmd.to_shell_string(), "ls -la /tmp");
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::builder("echo")
            .arg("hello")
            .arg("big world")
            .env("TEST_VAR", "test value")
            .current_dir("/tmp/my dir")
            .build();

        assert_eq!(cmd.get_program(), "echo");
        assert_eq!(cmd.get_args().len(), 2);
        assert_eq!(cmd.get_envs().get("TEST_VAR").map(String::as_str), Some("test value"));
        assert_eq!(cmd.get_current_dir(), Some(std::path::Path::new("/tmp/my dir")));
        assert_eq!(
            cmd.to_shell_string(),
            "cd '/tmp/my dir' && TEST_VAR='test value' echo hello 'big world'"
        );
    }

    #[test]
    fn test_optional_args_and_raw_suffix() {
        let cmd = Command::builder("docker")
            .arg("exec")
            .arg_if(true, "-i")
            .arg_if(false, "-t")
            .arg_opt("-u", None::<String>)
            .arg_opt("-w", Some("/srv"))
            .arg("c1")
            .raw("> /dev/null")
            .build();

        assert_eq!(cmd.to_string(), "docker exec -i -w /srv c1 > /dev/null");
    }

    #[test]
    fn test_command_clone() {
        let cmd1 = Command::builder("test")
            .arg("arg1")
            .env("KEY", "VALUE")
            .build();

        let cmd2 = cmd1.clone();

        assert_eq!(cmd1, cmd2);
        assert_eq!(cmd1.to_shell_string(), cmd2.to_shell_string());
    }
}
