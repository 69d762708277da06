//! sarstack - Staged-pipeline orchestrator for ISCE-2 SAR stack processing
//!
//! This library drives a multi-stage batch pipeline over a shared working
//! directory: it resolves a declarative template into a concrete
//! configuration, prepares the expensive input artifacts (DEM, raw/SLC
//! data), asks the external stack processor to materialize the pipeline as
//! an ordered set of run-file scripts, and then executes a selectable
//! sub-range of those scripts with per-stage process counts scaled against
//! a global budget.
//!
//! The scientific programs themselves (DEM stitchers, stack generators,
//! per-stage drivers) are external collaborators invoked through the
//! [`tools::ToolRunner`] seam; this crate only orchestrates them.
//!
//! # Typical flow
//!
//! ```ignore
//! use sarstack::config::{read_template, resolve, schema};
//! use sarstack::tools::SystemToolRunner;
//!
//! let raw = read_template(&template_path)?;
//! let mut config = resolve(&raw, schema::SCHEMA)?;
//! sarstack::dem::ensure_dem(&mut config, &project_dir, &SystemToolRunner)?;
//! ```

pub mod config;
pub mod coord;
pub mod dem;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod processor;
pub mod resources;
pub mod runner;
pub mod stage;
pub mod staging;
pub mod tools;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the ISCE-2 stack processor installation root.
pub const STACK_HOME_ENV: &str = "ISCE_STACK";

/// Environment variable holding the per-process thread count used by
/// thread-parallel stages.
pub const THREAD_COUNT_ENV: &str = "OMP_NUM_THREADS";
