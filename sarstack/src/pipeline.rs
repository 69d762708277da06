//! Top-level pipeline execution over a selected stage range.
//!
//! Stages run strictly in ordinal order, one at a time; parallelism lives
//! inside each stage, delegated to the external driver. The walk aborts on
//! the first stage failure, preserving the results of completed stages so
//! a human can resume with `--start` at the failed ordinal.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::resources;
use crate::runner::{ExecContext, ExecutionResult, StageError, StageRunner};
use crate::stage::{self, CatalogError};
use crate::tools::ToolRunner;

/// Directories the plan generator must have produced before execution.
pub const PLAN_DIRS: &[&str] = &["configs", "run_files"];

/// Pipeline-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A plan directory is absent; the plan generator has not run here
    #[error("no {name} folder found in {root}")]
    NotADirectory { name: &'static str, root: String },

    /// The selected range does not fit the catalog
    #[error("invalid stage range [{start}, {end}] for a {count}-stage pipeline")]
    InvalidRange {
        start: usize,
        end: usize,
        count: usize,
    },

    /// Stage discovery failed
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A stage could not be launched (distinct from a stage failing)
    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Inclusive 1-based stage range selected for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRange {
    pub start: usize,
    pub end: usize,
}

impl RunRange {
    /// Resolve optional start/end selections against a catalog of `count`
    /// stages, defaulting to the full range.
    pub fn resolve(
        start: Option<usize>,
        end: Option<usize>,
        count: usize,
    ) -> Result<Self, PipelineError> {
        let start = start.unwrap_or(1);
        let end = end.unwrap_or(count);
        if start < 1 || end > count || start > end {
            return Err(PipelineError::InvalidRange { start, end, count });
        }
        Ok(RunRange { start, end })
    }
}

/// Execution request: resource budget and range selection.
#[derive(Debug, Clone, Copy)]
pub struct PipelineRequest {
    /// Global worker process budget (`numProcess`)
    pub budget: usize,
    /// Threads per worker in thread-parallel stages (`OMP_NUM_THREADS`)
    pub thread_factor: usize,
    /// First stage to execute, 1-based; full catalog if unset
    pub start: Option<usize>,
    /// Last stage to execute, 1-based; full catalog if unset
    pub end: Option<usize>,
}

/// A stage failure that aborted the run.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub ordinal: u32,
    pub name: String,
    pub exit_code: i32,
}

/// Aggregated result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Results of stages completed successfully, in execution order
    pub completed: Vec<ExecutionResult>,
    /// The failure that stopped the run, if any
    pub failed: Option<StageFailure>,
}

impl RunResult {
    /// True when every selected stage ran and succeeded.
    pub fn success(&self) -> bool {
        self.failed.is_none()
    }
}

/// Execute the selected range of the discovered stage catalog.
///
/// Fails fast before any stage runs if the plan directories are missing or
/// the range is invalid. Per stage: scale the process budget, run through
/// the driver, and abort the remaining range on the first failure.
pub fn run_pipeline(
    project_dir: &Path,
    context: &ExecContext,
    tools: &dyn ToolRunner,
    request: &PipelineRequest,
) -> Result<RunResult, PipelineError> {
    for name in PLAN_DIRS {
        if !project_dir.join(name).is_dir() {
            return Err(PipelineError::NotADirectory {
                name,
                root: project_dir.display().to_string(),
            });
        }
    }

    let catalog = stage::discover(&project_dir.join("run_files"))?;

    // A plan with no stages is a no-op, not a range error. An explicit
    // selection over it is still rejected below.
    if catalog.is_empty() && request.start.is_none() && request.end.is_none() {
        warn!("no run files found, nothing to execute");
        return Ok(RunResult::default());
    }

    let range = RunRange::resolve(request.start, request.end, catalog.len())?;
    info!(
        stages = catalog.len(),
        start = range.start,
        end = range.end,
        "executing pipeline range"
    );

    let runner = StageRunner::new(context, tools);
    let mut result = RunResult::default();

    for stage in &catalog[range.start - 1..range.end] {
        let count = resources::runtime_count(
            stage.resource_class,
            request.budget,
            request.thread_factor,
        );
        match runner.run(stage, count) {
            Ok(execution) => result.completed.push(execution),
            Err(StageError::StageFailed { stage: name, code }) => {
                warn!(stage = %name, code, "stage failed, aborting remaining range");
                result.failed = Some(StageFailure {
                    ordinal: stage.ordinal,
                    name,
                    exit_code: code,
                });
                return Ok(result);
            }
            Err(other) => return Err(other.into()),
        }
    }

    info!(completed = result.completed.len(), "pipeline range finished");
    Ok(result)
}
