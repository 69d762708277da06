//! Stack plan generation.
//!
//! Asks the external stack generator (`stackSentinel.py` for topsStack,
//! `stackStripMap.py` for stripmapStack) to materialize the pipeline as
//! `configs/` and `run_files/` under the project directory. The argument
//! list is composed from the resolved configuration, with the per-kind
//! differences dispatched through one exhaustive match.

use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ResolvedConfig};
use crate::processor::ProcessorKind;
use crate::resources;
use crate::runner::ExecContext;
use crate::staging::Sensor;
use crate::tools::{ToolError, ToolInvocation, ToolRunner};

/// Plan generation errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A required option is unset or malformed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The generator could not be launched
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The generator exited non-zero
    #[error("stack plan generation failed: '{command}' exited with status {code}")]
    ExternalTool { command: String, code: i32 },
}

/// Generate the pipeline plan for the project.
///
/// `thread_factor` feeds the plan-time (floor) derivation of the topo
/// process count when `numProcess4topo` is not set explicitly. `sensor`
/// only matters for the stripmap workflow.
pub fn generate_plan(
    config: &ResolvedConfig,
    project_dir: &Path,
    context: &ExecContext,
    tools: &dyn ToolRunner,
    thread_factor: usize,
    sensor: Option<Sensor>,
) -> Result<(), PlanError> {
    let args = compose_args(config, project_dir, thread_factor, sensor)?;
    let script = context
        .stack_home
        .join(config.processor.stack_subdir())
        .join(config.processor.plan_script());

    let command = format!("{} {}", script.display(), args.join(" "));
    info!(generator = %config.processor.plan_script(), "generating stack plan");

    let invocation = ToolInvocation::new(command.clone())
        .in_dir(project_dir)
        .with_prefix(Some(context.path_prefix()));
    let code = tools.run(&invocation)?;
    if code != 0 {
        return Err(PlanError::ExternalTool { command, code });
    }
    Ok(())
}

/// Compose the generator's argument list from the resolved configuration.
pub fn compose_args(
    config: &ResolvedConfig,
    project_dir: &Path,
    thread_factor: usize,
    sensor: Option<Sensor>,
) -> Result<Vec<String>, PlanError> {
    let mut args: Vec<String> = Vec::new();

    // Options both generators require.
    let slc_dir = project_dir.join("SLC");
    push(&mut args, "--slc_directory", slc_dir.display().to_string());
    push(&mut args, "--workflow", config.require_text("workflow")?.to_string());
    push(&mut args, "--dem", config.require_text("demFile")?.to_string());
    push(&mut args, "--azimuth_looks", config.require_int("azimuthLooks")?.to_string());
    push(&mut args, "--range_looks", config.require_int("rangeLooks")?.to_string());
    push(
        &mut args,
        "--filter_strength",
        config
            .float("filtStrength")
            .ok_or_else(|| ConfigError::MissingOption {
                key: "filtStrength".to_string(),
            })?
            .to_string(),
    );
    push(&mut args, "--unw_method", config.require_text("unwrapMethod")?.to_string());

    match config.processor {
        ProcessorKind::Tops => {
            push(
                &mut args,
                "--coregistration",
                config.require_text("coregistration")?.to_string(),
            );
            push(
                &mut args,
                "--num_connections",
                config.require_int("numConnection")?.to_string(),
            );
            push(&mut args, "--aux_directory", config.require_text("auxDir")?.to_string());
            push(
                &mut args,
                "--orbit_directory",
                config.require_text("orbitDir")?.to_string(),
            );
            push(
                &mut args,
                "--virtual_merge",
                if config.bool_flag("virtualMerge") { "True" } else { "False" }.to_string(),
            );
        }
        ProcessorKind::Stripmap => {
            push(
                &mut args,
                "--time_threshold",
                config.require_int("maxTempBaseline")?.to_string(),
            );
            push(
                &mut args,
                "--baseline_threshold",
                config.require_int("maxPerpBaseline")?.to_string(),
            );
        }
    }

    // Optional common arguments.
    if let Some(date) = config.text("referenceDate") {
        push(&mut args, "--reference_date", date.to_string());
    }
    if let Some(bbox) = config.text("boundingBox") {
        push(&mut args, "--bbox", join_comma_list(bbox));
    }
    if config.bool_flag("useGPU") {
        args.push("--useGPU".to_string());
    }

    match config.processor {
        ProcessorKind::Tops => {
            if let Some(date) = config.text("startDate") {
                push(&mut args, "--start_date", reformat_date("startDate", date)?);
            }
            if let Some(date) = config.text("endDate") {
                push(&mut args, "--stop_date", reformat_date("endDate", date)?);
            }
            if let Some(swaths) = config.list("swathNum") {
                push(&mut args, "--swath_num", swaths.join(" "));
            }
            if let Some(budget) = config.int("numProcess") {
                let topo_count = match config.int("numProcess4topo") {
                    Some(explicit) => explicit as usize,
                    None => resources::plan_count(budget as usize, thread_factor),
                };
                push(&mut args, "--num_proc4topo", topo_count.to_string());
            }
            if let Some(ion_file) = config.text("paramIonFile") {
                push(&mut args, "--param_ion", ion_file.to_string());
                push(
                    &mut args,
                    "--num_connections_ion",
                    config.require_int("numConnectionIon")?.to_string(),
                );
            }
        }
        ProcessorKind::Stripmap => {
            // Zero-doppler SLC sensors skip focusing.
            if sensor == Some(Sensor::Alos2) {
                args.push("--nofocus".to_string());
                args.push("--zero".to_string());
            }
        }
    }

    Ok(args)
}

fn push(args: &mut Vec<String>, flag: &str, value: String) {
    args.push(flag.to_string());
    args.push(value);
}

/// Space-separated form of a comma-separated value for `--bbox`-style
/// multi-field flags.
fn join_comma_list(text: &str) -> String {
    text.split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `YYYYMMDD` template dates become the `YYYY-MM-DD` form the generator
/// expects.
fn reformat_date(key: &str, text: &str) -> Result<String, PlanError> {
    let date = NaiveDate::parse_from_str(text, "%Y%m%d").map_err(|_| {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: text.to_string(),
            reason: "expected a YYYYMMDD date".to_string(),
        }
    })?;
    Ok(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, schema::SCHEMA, TemplateMap};
    use crate::processor::ProcessorKind;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_from(entries: &[(&str, &str)]) -> ResolvedConfig {
        let raw: TemplateMap = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        resolve(&raw, SCHEMA).unwrap()
    }

    fn tops_config() -> ResolvedConfig {
        config_from(&[
            ("processor", "topsStack"),
            ("demFile", "/data/DEM/gsi10m.dem.wgs84"),
            ("boundingBox", "30, 31, 129, 130"),
        ])
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_common_args() {
        let config = tops_config();
        let args = compose_args(&config, Path::new("/proj"), 1, None).unwrap();
        assert_eq!(flag_value(&args, "--slc_directory"), Some("/proj/SLC"));
        assert_eq!(flag_value(&args, "--workflow"), Some("interferogram"));
        assert_eq!(flag_value(&args, "--dem"), Some("/data/DEM/gsi10m.dem.wgs84"));
        assert_eq!(flag_value(&args, "--azimuth_looks"), Some("3"));
        assert_eq!(flag_value(&args, "--range_looks"), Some("9"));
        assert_eq!(flag_value(&args, "--filter_strength"), Some("0.5"));
        assert_eq!(flag_value(&args, "--unw_method"), Some("snaphu"));
    }

    #[test]
    fn test_bbox_fields_are_space_separated() {
        let config = tops_config();
        let args = compose_args(&config, Path::new("/proj"), 1, None).unwrap();
        assert_eq!(flag_value(&args, "--bbox"), Some("30 31 129 130"));
    }

    #[test]
    fn test_tops_specific_args() {
        let config = config_from(&[
            ("processor", "topsStack"),
            ("demFile", "/data/dem.wgs84"),
            ("startDate", "20140825"),
            ("endDate", "20190622"),
            ("swathNum", "1,2"),
        ]);
        let args = compose_args(&config, Path::new("/proj"), 1, None).unwrap();
        assert_eq!(flag_value(&args, "--coregistration"), Some("geometry"));
        assert_eq!(flag_value(&args, "--virtual_merge"), Some("False"));
        assert_eq!(flag_value(&args, "--start_date"), Some("2014-08-25"));
        assert_eq!(flag_value(&args, "--stop_date"), Some("2019-06-22"));
        assert_eq!(flag_value(&args, "--swath_num"), Some("1 2"));
        assert!(flag_value(&args, "--time_threshold").is_none());
    }

    #[test]
    fn test_topo_count_uses_plan_time_floor() {
        let config = config_from(&[
            ("processor", "topsStack"),
            ("demFile", "/data/dem.wgs84"),
            ("numProcess", "9"),
        ]);
        let args = compose_args(&config, Path::new("/proj"), 4, None).unwrap();
        // floor(9 / 4), never the runtime ceiling.
        assert_eq!(flag_value(&args, "--num_proc4topo"), Some("2"));
    }

    #[test]
    fn test_explicit_topo_count_wins() {
        let config = config_from(&[
            ("processor", "topsStack"),
            ("demFile", "/data/dem.wgs84"),
            ("numProcess", "9"),
            ("numProcess4topo", "6"),
        ]);
        let args = compose_args(&config, Path::new("/proj"), 4, None).unwrap();
        assert_eq!(flag_value(&args, "--num_proc4topo"), Some("6"));
    }

    #[test]
    fn test_ionosphere_args_only_with_param_file() {
        let without = config_from(&[("processor", "topsStack"), ("demFile", "/d.wgs84")]);
        let args = compose_args(&without, Path::new("/proj"), 1, None).unwrap();
        assert!(flag_value(&args, "--param_ion").is_none());

        let with = config_from(&[
            ("processor", "topsStack"),
            ("demFile", "/d.wgs84"),
            ("paramIonFile", "./ion_param.txt"),
        ]);
        let args = compose_args(&with, Path::new("/proj"), 1, None).unwrap();
        assert!(flag_value(&args, "--param_ion").unwrap().ends_with("ion_param.txt"));
        assert_eq!(flag_value(&args, "--num_connections_ion"), Some("3"));
    }

    #[test]
    fn test_stripmap_specific_args() {
        let config = config_from(&[
            ("processor", "stripmapStack"),
            ("demFile", "/data/dem.wgs84"),
        ]);
        let args =
            compose_args(&config, Path::new("/proj"), 1, Some(Sensor::Alos2)).unwrap();
        assert_eq!(flag_value(&args, "--time_threshold"), Some("1800"));
        assert_eq!(flag_value(&args, "--baseline_threshold"), Some("1800"));
        assert!(args.contains(&"--nofocus".to_string()));
        assert!(args.contains(&"--zero".to_string()));
        assert!(flag_value(&args, "--coregistration").is_none());

        let args = compose_args(&config, Path::new("/proj"), 1, Some(Sensor::Alos)).unwrap();
        assert!(!args.contains(&"--nofocus".to_string()));
    }

    #[test]
    fn test_missing_dem_is_config_error() {
        let config = config_from(&[("processor", "topsStack")]);
        let err = compose_args(&config, Path::new("/proj"), 1, None).unwrap_err();
        assert!(err.to_string().contains("demFile"));
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let config = config_from(&[
            ("processor", "topsStack"),
            ("demFile", "/d.wgs84"),
            ("startDate", "2014-08-25"),
        ]);
        let err = compose_args(&config, Path::new("/proj"), 1, None).unwrap_err();
        assert!(err.to_string().contains("startDate"));
    }

    #[test]
    fn test_generate_plan_invokes_generator_in_project_dir() {
        struct Recorder(RefCell<Vec<ToolInvocation>>);
        impl ToolRunner for Recorder {
            fn run(&self, inv: &ToolInvocation) -> Result<i32, ToolError> {
                self.0.borrow_mut().push(inv.clone());
                Ok(0)
            }
        }

        let temp = TempDir::new().unwrap();
        let config = tops_config();
        let context = ExecContext {
            stack_home: PathBuf::from("/opt/isce_stack"),
            processor: ProcessorKind::Tops,
        };
        let runner = Recorder(RefCell::new(Vec::new()));

        generate_plan(&config, temp.path(), &context, &runner, 1, None).unwrap();

        let calls = runner.0.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0]
            .command
            .starts_with("/opt/isce_stack/topsStack/stackSentinel.py "));
        assert_eq!(calls[0].current_dir.as_deref(), Some(temp.path()));
    }
}
