//! Single-stage execution through the external run driver.
//!
//! A stage is a script of commands executed by the stack toolkit's
//! `run.py` driver, which fans the script's command lines out over a pool
//! of worker processes. The orchestrator composes the driver invocation,
//! blocks until the whole stage exits, and records wall-clock duration.
//! A non-zero exit is fatal to the run; there is no retry.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::processor::ProcessorKind;
use crate::resources;
use crate::stage::Stage;
use crate::tools::{ToolError, ToolInvocation, ToolRunner};

/// Stage execution errors.
#[derive(Debug, Error)]
pub enum StageError {
    /// The stack toolkit root is not configured
    #[error("environment variable {0} is not set; cannot locate stage drivers")]
    MissingStackHome(&'static str),

    /// Could not read the stage script
    #[error("failed to read stage script {path}: {source}")]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The driver could not be launched
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The stage's driver exited non-zero; fatal, aborts the run
    #[error("stage '{stage}' failed with exit status {code}")]
    StageFailed { stage: String, code: i32 },
}

/// Where the external stack toolkit lives and how its drivers become
/// reachable. Passed explicitly instead of mutating the process
/// environment, so concurrent runs and tests stay isolated.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Installation root of the stack processing toolkit
    pub stack_home: PathBuf,
    /// Which processor's script directory to expose on `PATH`
    pub processor: ProcessorKind,
}

impl ExecContext {
    /// Build a context from the `ISCE_STACK` environment variable.
    pub fn from_env(processor: ProcessorKind) -> Result<Self, StageError> {
        let stack_home = std::env::var(crate::STACK_HOME_ENV)
            .map_err(|_| StageError::MissingStackHome(crate::STACK_HOME_ENV))?;
        Ok(ExecContext {
            stack_home: PathBuf::from(stack_home),
            processor,
        })
    }

    /// The run driver consuming stage scripts. Both processors ship their
    /// stage scripts in a common format and share the topsStack driver.
    pub fn driver_path(&self) -> PathBuf {
        self.stack_home.join("topsStack").join("run.py")
    }

    /// Export command making the processor's scripts reachable, chained
    /// before each driver invocation in the same shell context.
    pub fn path_prefix(&self) -> String {
        format!(
            "export PATH=${{PATH}}:{}",
            self.stack_home.join(self.processor.stack_subdir()).display()
        )
    }
}

/// Outcome of one executed stage.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Ordinal of the executed stage
    pub ordinal: u32,
    /// Stage name
    pub name: String,
    /// Driver exit code (zero here; non-zero exits become errors)
    pub exit_code: i32,
    /// Wall-clock time from invocation to driver exit
    pub duration: Duration,
    /// Worker process count handed to the driver, after clamping
    pub process_count: usize,
}

/// Executes stages through the external run driver.
pub struct StageRunner<'a> {
    context: &'a ExecContext,
    tools: &'a dyn ToolRunner,
}

impl<'a> StageRunner<'a> {
    pub fn new(context: &'a ExecContext, tools: &'a dyn ToolRunner) -> Self {
        StageRunner { context, tools }
    }

    /// Run one stage to completion with `process_count` workers.
    ///
    /// The count is clamped to the script's command-line count before the
    /// driver is invoked. Blocks until the stage exits.
    pub fn run(&self, stage: &Stage, process_count: usize) -> Result<ExecutionResult, StageError> {
        debug_assert!(stage.ordinal >= 1, "stage ordinals are 1-based");
        let command_lines = stage.command_line_count().map_err(|e| StageError::ScriptRead {
            path: stage.script.clone(),
            source: e,
        })?;
        let process_count = resources::clamp_to_work(process_count, command_lines);

        let command = format!(
            "{} -i {} -p {}",
            self.context.driver_path().display(),
            stage.script.display(),
            process_count
        );
        let invocation =
            ToolInvocation::new(command).with_prefix(Some(self.context.path_prefix()));

        info!(stage = %stage.name, processes = process_count, "running stage");
        let started = Instant::now();
        let code = self.tools.run(&invocation)?;
        let duration = started.elapsed();

        if code != 0 {
            return Err(StageError::StageFailed {
                stage: stage.name.clone(),
                code,
            });
        }

        info!(
            stage = %stage.name,
            seconds = duration.as_secs(),
            "stage finished"
        );
        Ok(ExecutionResult {
            ordinal: stage.ordinal,
            name: stage.name.clone(),
            exit_code: code,
            duration,
            process_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ResourceClass;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct ScriptedRunner {
        calls: RefCell<Vec<ToolInvocation>>,
        exit_code: i32,
    }

    impl ScriptedRunner {
        fn new(exit_code: i32) -> Self {
            ScriptedRunner {
                calls: RefCell::new(Vec::new()),
                exit_code,
            }
        }
    }

    impl ToolRunner for ScriptedRunner {
        fn run(&self, invocation: &ToolInvocation) -> Result<i32, ToolError> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok(self.exit_code)
        }
    }

    fn context() -> ExecContext {
        ExecContext {
            stack_home: PathBuf::from("/opt/isce_stack"),
            processor: ProcessorKind::Tops,
        }
    }

    fn stage_with_script(temp: &TempDir, lines: usize) -> Stage {
        let script = temp.path().join("run_01_unpack_topo_reference");
        let content = "command line\n".repeat(lines);
        std::fs::write(&script, content).unwrap();
        Stage {
            ordinal: 1,
            name: "unpack_topo_reference".to_string(),
            script,
            resource_class: ResourceClass::Ordinary,
        }
    }

    #[test]
    fn test_run_composes_driver_invocation() {
        let temp = TempDir::new().unwrap();
        let stage = stage_with_script(&temp, 8);
        let ctx = context();
        let runner = ScriptedRunner::new(0);

        let result = StageRunner::new(&ctx, &runner).run(&stage, 4).unwrap();
        assert_eq!(result.process_count, 4);
        assert_eq!(result.exit_code, 0);

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].command.starts_with("/opt/isce_stack/topsStack/run.py -i "));
        assert!(calls[0].command.ends_with("-p 4"));
        assert_eq!(
            calls[0].shell_prefix.as_deref(),
            Some("export PATH=${PATH}:/opt/isce_stack/topsStack")
        );
    }

    #[test]
    fn test_run_clamps_to_command_lines() {
        let temp = TempDir::new().unwrap();
        let stage = stage_with_script(&temp, 2);
        let ctx = context();
        let runner = ScriptedRunner::new(0);

        let result = StageRunner::new(&ctx, &runner).run(&stage, 16).unwrap();
        assert_eq!(result.process_count, 2);
        assert!(runner.calls.borrow()[0].command.ends_with("-p 2"));
    }

    #[test]
    fn test_nonzero_exit_is_stage_failure() {
        let temp = TempDir::new().unwrap();
        let stage = stage_with_script(&temp, 3);
        let ctx = context();
        let runner = ScriptedRunner::new(137);

        let err = StageRunner::new(&ctx, &runner).run(&stage, 2).unwrap_err();
        match err {
            StageError::StageFailed { stage, code } => {
                assert_eq!(stage, "unpack_topo_reference");
                assert_eq!(code, 137);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_script_is_read_error() {
        let ctx = context();
        let runner = ScriptedRunner::new(0);
        let stage = Stage {
            ordinal: 1,
            name: "ghost".to_string(),
            script: PathBuf::from("/no/such/run_01_ghost"),
            resource_class: ResourceClass::Ordinary,
        };
        let err = StageRunner::new(&ctx, &runner).run(&stage, 2).unwrap_err();
        assert!(matches!(err, StageError::ScriptRead { .. }));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_stripmap_prefix_exposes_stripmap_scripts() {
        let ctx = ExecContext {
            stack_home: PathBuf::from("/opt/isce_stack"),
            processor: ProcessorKind::Stripmap,
        };
        assert_eq!(
            ctx.path_prefix(),
            "export PATH=${PATH}:/opt/isce_stack/stripmapStack"
        );
        // The run driver itself is shared.
        assert_eq!(
            ctx.driver_path(),
            PathBuf::from("/opt/isce_stack/topsStack/run.py")
        );
    }
}
