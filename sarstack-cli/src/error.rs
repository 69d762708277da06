//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use sarstack::config::ConfigError;
use sarstack::dem::DemError;
use sarstack::pipeline::PipelineError;
use sarstack::plan::PlanError;
use sarstack::staging::StagingError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Template reading or resolution error
    Config(ConfigError),
    /// The workflow environment is not set up
    Environment(String),
    /// DEM acquisition failed
    Dem(DemError),
    /// The stripmap project name does not identify a supported sensor
    UnsupportedSensor { project: String },
    /// Raw-data staging failed
    Staging(StagingError),
    /// Stack plan generation failed
    Plan(PlanError),
    /// Pipeline setup or execution failed
    Pipeline(PipelineError),
    /// A stage exited non-zero; the run stopped at its ordinal
    StageFailed {
        ordinal: u32,
        name: String,
        exit_code: i32,
    },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Environment(_) => {
                eprintln!();
                eprintln!("Set ISCE_STACK to the root of the stack toolkit, e.g.:");
                eprintln!("  export ISCE_STACK=~/tools/isce2/contrib/stack");
            }
            CliError::StageFailed { ordinal, .. } => {
                eprintln!();
                eprintln!("Inspect the stage log, then resume from the failed stage:");
                eprintln!("  sarstack <template> --start {} --run", ordinal);
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Environment(msg) => write!(f, "Environment error: {}", msg),
            CliError::Dem(e) => write!(f, "DEM preparation failed: {}", e),
            CliError::UnsupportedSensor { project } => write!(
                f,
                "unsupported sensor: cannot identify ALOS or ALOS2 from project name '{}'",
                project
            ),
            CliError::Staging(e) => write!(f, "Raw-data staging failed: {}", e),
            CliError::Plan(e) => write!(f, "Stack plan generation failed: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            CliError::StageFailed {
                ordinal,
                name,
                exit_code,
            } => write!(
                f,
                "stage {} ({}) failed with exit code {}",
                ordinal, name, exit_code
            ),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Dem(e) => Some(e),
            CliError::Staging(e) => Some(e),
            CliError::Plan(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<DemError> for CliError {
    fn from(e: DemError) -> Self {
        CliError::Dem(e)
    }
}

impl From<StagingError> for CliError {
    fn from(e: StagingError) -> Self {
        CliError::Staging(e)
    }
}

impl From<PlanError> for CliError {
    fn from(e: PlanError) -> Self {
        CliError::Plan(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}
