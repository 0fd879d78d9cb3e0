//! Narrow seam for running external programs.
//!
//! Higher-level crates build argument vectors and hand them to a
//! [`CommandRunner`], which keeps command construction testable without
//! spawning real processes.

use std::path::PathBuf;

use crate::error::{BcbioError, Result};

/// A program invocation: executable, arguments, and extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    /// Program name or path.
    pub program: String,
    /// Arguments, excluding the program itself.
    pub args: Vec<String>,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    /// Creates a command for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Returns the full argument vector including the program name.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Output captured from a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code, `-1` if the process was terminated by a signal.
    pub exit_code: i32,
}

/// Executes [`CommandLine`]s.
pub trait CommandRunner {
    /// Runs the command with inherited stdio and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be launched.
    fn status(&self, command: &CommandLine) -> Result<i32>;

    /// Runs the command and captures its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be launched.
    fn output(&self, command: &CommandLine) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn prepare(command: &CommandLine) -> Result<std::process::Command> {
        let program = resolve_program(&command.program)?;
        let mut cmd = std::process::Command::new(program);
        let _ = cmd.args(&command.args);
        for (key, value) in &command.env {
            let _ = cmd.env(key, value);
        }
        Ok(cmd)
    }
}

impl CommandRunner for SystemRunner {
    fn status(&self, command: &CommandLine) -> Result<i32> {
        tracing::info!(cmd = ?command.argv(), "running command");
        let status = Self::prepare(command)?
            .status()
            .map_err(|e| BcbioError::Io {
                path: command.program.clone().into(),
                source: e,
            })?;
        Ok(status.code().unwrap_or(-1))
    }

    fn output(&self, command: &CommandLine) -> Result<CommandOutput> {
        tracing::debug!(cmd = ?command.argv(), "running command for output");
        let output = Self::prepare(command)?
            .output()
            .map_err(|e| BcbioError::Io {
                path: command.program.clone().into(),
                source: e,
            })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Resolves a program name against `PATH`.
///
/// Names containing a path separator are returned unchanged.
///
/// # Errors
///
/// Returns [`BcbioError::Process`] if the program cannot be found.
pub fn resolve_program(program: &str) -> Result<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Ok(PathBuf::from(program));
    }
    which::which(program).map_err(|e| BcbioError::Process {
        program: program.into(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_starts_with_program() {
        let cmd = CommandLine::new("docker").arg("ps").args(["-a", "-q"]);
        assert_eq!(cmd.argv(), vec!["docker", "ps", "-a", "-q"]);
    }

    #[test]
    fn env_is_recorded() {
        let cmd = CommandLine::new("true").env("A", "1");
        assert_eq!(cmd.env, vec![("A".to_string(), "1".to_string())]);
    }

    #[test]
    fn resolve_program_keeps_explicit_paths() {
        let path = resolve_program("/opt/tool/bin/run").expect("resolve");
        assert_eq!(path, PathBuf::from("/opt/tool/bin/run"));
    }

    #[test]
    fn resolve_program_reports_missing_binary() {
        let err = resolve_program("definitely-not-a-real-binary-name").unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-real-binary-name"));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output() {
        let out = SystemRunner
            .output(&CommandLine::new("sh").args(["-c", "echo hi; exit 3"]))
            .expect("run sh");
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.exit_code, 3);
    }
}
