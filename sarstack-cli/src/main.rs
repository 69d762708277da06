//! sarstack CLI - Command-line interface
//!
//! This binary drives the staged InSAR stack workflow from a template file:
//! DEM preparation, stack plan generation, and run-file execution.

mod error;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;

use error::CliError;

use sarstack::config::{read_template, resolve, schema::SCHEMA};
use sarstack::logging::{default_log_dir, default_log_file, init_logging};
use sarstack::pipeline::{run_pipeline, PipelineRequest};
use sarstack::processor::ProcessorKind;
use sarstack::runner::ExecContext;
use sarstack::staging::Sensor;
use sarstack::tools::{SystemToolRunner, ToolRunner};
use sarstack::{dem, plan, resources, staging};

#[derive(Parser)]
#[command(name = "sarstack")]
#[command(version = sarstack::VERSION)]
#[command(about = "Drive an ISCE stack-processing workflow from a template file", long_about = None)]
struct Args {
    /// Template file with isce.* options
    #[arg(required_unless_present = "reset")]
    template: Option<PathBuf>,

    /// Execute the generated run files after planning
    #[arg(long)]
    run: bool,

    /// Print the commands that reset the process directory, then exit
    #[arg(long)]
    reset: bool,

    /// First stage to execute, 1-based (implies --run, skips preparation)
    #[arg(long)]
    start: Option<usize>,

    /// Last stage to execute, 1-based (implies --run)
    #[arg(long)]
    end: Option<usize>,
}

/// How one invocation drives the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Skip preparation and execute a range of an existing plan.
    Resume,
    /// Full preparation (DEM, staging, plan), optionally executing after.
    Prepare { execute: bool },
}

/// `--start` resumes an existing plan; `--end` alone still prepares the
/// project first, then executes stages up to the given ordinal.
fn select_flow(args: &Args) -> Flow {
    if args.start.is_some() {
        Flow::Resume
    } else {
        Flow::Prepare {
            execute: args.run || args.end.is_some(),
        }
    }
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        e.exit();
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let _guard = init_logging(default_log_dir(), default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    info!(version = sarstack::VERSION, "sarstack starting");

    if args.reset {
        let processor = match &args.template {
            Some(path) => resolve(&read_template(path)?, SCHEMA)?.processor,
            None => ProcessorKind::Tops,
        };
        print!("{}", processor.reset_commands());
        return Ok(());
    }

    let template = args.template.as_deref().unwrap(); // Safe: required_unless_present
    let raw = read_template(template)?;
    let mut config = resolve(&raw, SCHEMA)?;
    let processor = config.processor;
    println!("Stack processor: {}", processor);

    let context =
        ExecContext::from_env(processor).map_err(|e| CliError::Environment(e.to_string()))?;
    let thread_factor = resources::thread_factor_from_env();
    let budget = config.require_int("numProcess").map_err(CliError::Config)? as usize;
    let project_dir = std::env::current_dir()
        .map_err(|e| CliError::Environment(format!("cannot determine working directory: {}", e)))?;
    let tools = SystemToolRunner;

    let execute = match select_flow(&args) {
        Flow::Resume => {
            return execute_stages(
                &project_dir,
                &context,
                &tools,
                budget,
                thread_factor,
                args.start,
                args.end,
            );
        }
        Flow::Prepare { execute } => execute,
    };

    dem::ensure_dem(&mut config, &project_dir, &tools)?;

    let sensor = if processor == ProcessorKind::Stripmap {
        Some(prepare_stripmap_inputs(template, &config, &project_dir, &context, &tools)?)
    } else {
        None
    };

    plan::generate_plan(&config, &project_dir, &context, &tools, thread_factor, sensor)?;
    println!("Run files generated under run_files/");

    if execute {
        execute_stages(&project_dir, &context, &tools, budget, thread_factor, None, args.end)?;
    }
    Ok(())
}

/// Stripmap raw-data staging: unpack the sensor's archives, then seed the
/// reference shelve folder. Errors when the project name identifies no
/// supported sensor.
fn prepare_stripmap_inputs(
    template: &Path,
    config: &sarstack::config::ResolvedConfig,
    project_dir: &Path,
    context: &ExecContext,
    tools: &dyn ToolRunner,
) -> Result<Sensor, CliError> {
    let project_name = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(sensor) = Sensor::detect(&project_name) else {
        return Err(CliError::UnsupportedSensor {
            project: project_name,
        });
    };

    println!("Detected sensor: {:?}, unpacking raw data", sensor);
    staging::prepare_raw_data(sensor, config, project_dir, context, tools)?;
    staging::stage_reference_shelve(config, project_dir)?;
    Ok(sensor)
}

fn execute_stages(
    project_dir: &Path,
    context: &ExecContext,
    tools: &dyn ToolRunner,
    budget: usize,
    thread_factor: usize,
    start: Option<usize>,
    end: Option<usize>,
) -> Result<(), CliError> {
    let request = PipelineRequest {
        budget,
        thread_factor,
        start,
        end,
    };
    let result = run_pipeline(project_dir, context, tools, &request)?;

    for execution in &result.completed {
        println!(
            "✓ stage {:2} {} ({} processes, {:.1}s)",
            execution.ordinal,
            execution.name,
            execution.process_count,
            execution.duration.as_secs_f64()
        );
    }

    if let Some(failure) = result.failed {
        return Err(CliError::StageFailed {
            ordinal: failure.ordinal,
            name: failure.name,
            exit_code: failure.exit_code,
        });
    }

    println!("All {} stages completed", result.completed.len());
    Ok(())
}
