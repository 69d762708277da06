//! External tool invocation seam.
//!
//! Every external program this crate touches (DEM stitchers, stack plan
//! generators, per-stage run drivers, raw-data unpackers) goes through the
//! [`ToolRunner`] trait, so orchestration logic can be exercised in tests
//! with recording fakes instead of real child processes.
//!
//! Invocations carry their working directory and optional environment-setup
//! prefix explicitly; the orchestrator never mutates its own process state
//! (no `chdir`, no `PATH` rewriting) to keep runs composable.

use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

/// Errors launching an external tool.
///
/// A tool that launches but exits non-zero is not an error at this layer;
/// callers inspect the returned exit code and attach their own context.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The shell could not be spawned at all
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// One external tool invocation, executed through `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// The command line to execute
    pub command: String,
    /// Working directory for the child, if different from the parent's
    pub current_dir: Option<PathBuf>,
    /// Environment-setup command chained before `command` with `;` so
    /// exported variables are visible to it
    pub shell_prefix: Option<String>,
}

impl ToolInvocation {
    /// Create an invocation of `command` in the parent's working directory.
    pub fn new(command: impl Into<String>) -> Self {
        ToolInvocation {
            command: command.into(),
            current_dir: None,
            shell_prefix: None,
        }
    }

    /// Run the tool from `dir` instead of the parent's working directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Chain `prefix` before the command in the same shell context.
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.shell_prefix = prefix;
        self
    }

    /// The full shell line, prefix included.
    pub fn shell_line(&self) -> String {
        match &self.shell_prefix {
            Some(prefix) => format!("{}; {}", prefix, self.command),
            None => self.command.clone(),
        }
    }
}

/// Blocking executor of external tool invocations.
pub trait ToolRunner {
    /// Run the tool to completion and return its exit code.
    ///
    /// Blocks until the child (and the whole shell line) exits. Returns
    /// `Err` only when the child could not be launched; a non-zero exit
    /// code is returned as `Ok`.
    fn run(&self, invocation: &ToolInvocation) -> Result<i32, ToolError>;
}

/// [`ToolRunner`] backed by real child processes via `sh -c`.
pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<i32, ToolError> {
        let line = invocation.shell_line();
        tracing::debug!(command = %line, "running external tool");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&line);
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|e| ToolError::Spawn {
            command: line.clone(),
            source: e,
        })?;

        // Terminated-by-signal children have no code; report as -1.
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_line_without_prefix() {
        let inv = ToolInvocation::new("echo hi");
        assert_eq!(inv.shell_line(), "echo hi");
    }

    #[test]
    fn test_shell_line_chains_prefix() {
        let inv = ToolInvocation::new("run.py -i run_01_unpack -p 4")
            .with_prefix(Some("export PATH=${PATH}:/opt/isce/topsStack".to_string()));
        assert_eq!(
            inv.shell_line(),
            "export PATH=${PATH}:/opt/isce/topsStack; run.py -i run_01_unpack -p 4"
        );
    }

    #[test]
    fn test_system_runner_reports_exit_code() {
        let runner = SystemToolRunner;
        assert_eq!(runner.run(&ToolInvocation::new("true")).unwrap(), 0);
        assert_eq!(runner.run(&ToolInvocation::new("exit 3")).unwrap(), 3);
    }

    #[test]
    fn test_system_runner_honors_working_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = SystemToolRunner;
        let inv = ToolInvocation::new("test \"$(pwd)\" = \"$EXPECTED\"")
            .in_dir(temp.path())
            .with_prefix(Some(format!(
                "export EXPECTED={}",
                temp.path().display()
            )));
        assert_eq!(runner.run(&inv).unwrap(), 0);
    }
}
