//! Reference-data staging and raw-data preparation.
//!
//! Two pre-plan chores recovered here: copying the reference date's
//! shelve files into `referenceShelve/` at the project root, and (for the
//! stripmap workflow) unpacking downloaded ALOS / ALOS-2 archives into
//! `SLC/` through the external prep tools. Both are idempotent in the
//! artifact-gate sense: existing outputs short-circuit the work.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::runner::{ExecContext, StageError, StageRunner};
use crate::stage::{Stage, ResourceClass};
use crate::tools::{ToolError, ToolInvocation, ToolRunner};

/// Shelve files identifying the reference acquisition.
pub const SHELVE_FILES: &[&str] = &["data.bak", "data.dat", "data.dir"];

/// Staging errors.
#[derive(Debug, Error)]
pub enum StagingError {
    /// No per-date SLC folder to stage the reference from
    #[error("no SLC date folders found under {slc_dir}")]
    NoSlcDates { slc_dir: PathBuf },

    /// A prep tool could not be launched
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A prep tool exited non-zero
    #[error("raw data preparation failed: '{command}' exited with status {code}")]
    ExternalTool { command: String, code: i32 },

    /// The unpack run file failed
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Filesystem error while staging
    #[error("staging error: {0}")]
    Io(#[from] std::io::Error),
}

/// Radar sensor feeding the stripmap workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Alos,
    Alos2,
}

impl Sensor {
    /// Infer the sensor from a project name (template file stem), e.g.
    /// `KujuAlos2DT23` names an ALOS-2 track.
    pub fn detect(project_name: &str) -> Option<Sensor> {
        let lower = project_name.to_ascii_lowercase();
        if lower.contains("alos2") {
            Some(Sensor::Alos2)
        } else if lower.contains("alos") {
            Some(Sensor::Alos)
        } else {
            None
        }
    }
}

/// Copy the reference date's shelve files into `referenceShelve/`.
///
/// Uses the configured `referenceDate`, falling back to the first date
/// folder under `SLC/`. Skips silently when the target directory (or the
/// complete file set) already exists.
pub fn stage_reference_shelve(
    config: &ResolvedConfig,
    project_dir: &Path,
) -> Result<(), StagingError> {
    let shelve_dir = project_dir.join("referenceShelve");
    if shelve_dir.is_dir() {
        info!(dir = %shelve_dir.display(), "referenceShelve folder already exists");
        return Ok(());
    }
    std::fs::create_dir_all(&shelve_dir)?;

    if SHELVE_FILES
        .iter()
        .all(|name| shelve_dir.join(name).is_file())
    {
        info!("all shelve files already exist");
        return Ok(());
    }

    let slc_dir = project_dir.join("SLC");
    let reference_date = match config.text("referenceDate") {
        Some(date) => date.to_string(),
        None => first_date_folder(&slc_dir)?,
    };

    let date_dir = slc_dir.join(&reference_date);
    for name in SHELVE_FILES {
        let source = date_dir.join(name);
        std::fs::copy(&source, shelve_dir.join(name))?;
        info!(file = %source.display(), "staged shelve file");
    }
    Ok(())
}

/// Earliest per-date subfolder of `SLC/`, by name.
fn first_date_folder(slc_dir: &Path) -> Result<String, StagingError> {
    let mut dates: Vec<String> = std::fs::read_dir(slc_dir)
        .map_err(|_| StagingError::NoSlcDates {
            slc_dir: slc_dir.to_path_buf(),
        })?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    dates.sort();
    dates.into_iter().next().ok_or(StagingError::NoSlcDates {
        slc_dir: slc_dir.to_path_buf(),
    })
}

/// Unpack downloaded raw archives into `SLC/` for the given sensor, then
/// execute the produced unpack run file.
pub fn prepare_raw_data(
    sensor: Sensor,
    config: &ResolvedConfig,
    project_dir: &Path,
    context: &ExecContext,
    tools: &dyn ToolRunner,
) -> Result<(), StagingError> {
    let (command, unpack_script) = match sensor {
        Sensor::Alos => {
            let mut command = r#"prepRawALOS.py -i ./download -o ./SLC -t """#.to_string();
            if config.bool_flag("alosFbd2fbs") {
                command.push_str(" --dual2single");
            }
            (command, "run_unPackALOS")
        }
        Sensor::Alos2 => {
            let mut command = r#"prepSlcALOS2.py -i ./download -o ./SLC -t """#.to_string();
            if let Some(polarization) = config.text("alos2Polarization") {
                command.push_str(&format!(" --polarization {}", polarization));
            }
            (command, "run_unPackALOS2")
        }
    };

    info!(command = %command, "preparing raw data");
    let invocation = ToolInvocation::new(command.clone())
        .in_dir(project_dir)
        .with_prefix(Some(context.path_prefix()));
    let code = tools.run(&invocation)?;
    if code != 0 {
        return Err(StagingError::ExternalTool { command, code });
    }

    let budget = config.int("numProcess").unwrap_or(1).max(1) as usize;
    // Out-of-catalog script; ordinals are 1-based even off the catalog.
    let unpack = Stage {
        ordinal: 1,
        name: unpack_script.to_string(),
        script: project_dir.join(unpack_script),
        resource_class: ResourceClass::Ordinary,
    };
    StageRunner::new(context, tools).run(&unpack, budget)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, schema::SCHEMA, TemplateMap};
    use crate::processor::ProcessorKind;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Recorder(RefCell<Vec<ToolInvocation>>);

    impl ToolRunner for Recorder {
        fn run(&self, inv: &ToolInvocation) -> Result<i32, ToolError> {
            self.0.borrow_mut().push(inv.clone());
            Ok(0)
        }
    }

    fn config_from(entries: &[(&str, &str)]) -> ResolvedConfig {
        let raw: TemplateMap = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        resolve(&raw, SCHEMA).unwrap()
    }

    fn seeded_project(dates: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for date in dates {
            let dir = temp.path().join("SLC").join(date);
            std::fs::create_dir_all(&dir).unwrap();
            for name in SHELVE_FILES {
                std::fs::write(dir.join(name), format!("{} {}", date, name)).unwrap();
            }
        }
        temp
    }

    #[test]
    fn test_sensor_detection_from_project_name() {
        assert_eq!(Sensor::detect("KujuAlos2DT23"), Some(Sensor::Alos2));
        assert_eq!(Sensor::detect("KirishimaAlosAT424"), Some(Sensor::Alos));
        assert_eq!(Sensor::detect("AtacamaSenAT120"), None);
    }

    #[test]
    fn test_reference_shelve_uses_first_date_by_default() {
        let project = seeded_project(&["20150101", "20140825"]);
        let config = config_from(&[("processor", "stripmapStack")]);

        stage_reference_shelve(&config, project.path()).unwrap();

        let staged = project.path().join("referenceShelve").join("data.dat");
        let content = std::fs::read_to_string(staged).unwrap();
        assert!(content.starts_with("20140825"));
    }

    #[test]
    fn test_reference_shelve_honors_reference_date() {
        let project = seeded_project(&["20140825", "20150101"]);
        let config = config_from(&[
            ("processor", "stripmapStack"),
            ("referenceDate", "20150101"),
        ]);

        stage_reference_shelve(&config, project.path()).unwrap();

        let content =
            std::fs::read_to_string(project.path().join("referenceShelve").join("data.dir"))
                .unwrap();
        assert!(content.starts_with("20150101"));
    }

    #[test]
    fn test_reference_shelve_skips_existing_directory() {
        let project = seeded_project(&["20140825"]);
        std::fs::create_dir(project.path().join("referenceShelve")).unwrap();
        let config = config_from(&[("processor", "stripmapStack")]);

        // Existing folder short-circuits; nothing is copied.
        stage_reference_shelve(&config, project.path()).unwrap();
        assert!(!project
            .path()
            .join("referenceShelve")
            .join("data.dat")
            .exists());
    }

    #[test]
    fn test_reference_shelve_without_slc_dates() {
        let temp = TempDir::new().unwrap();
        let config = config_from(&[("processor", "stripmapStack")]);
        let err = stage_reference_shelve(&config, temp.path()).unwrap_err();
        assert!(matches!(err, StagingError::NoSlcDates { .. }));
    }

    #[test]
    fn test_prepare_raw_data_alos2_polarization() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("run_unPackALOS2"), "unpack 20140825\n").unwrap();

        let config = config_from(&[("processor", "stripmapStack")]);
        let context = ExecContext {
            stack_home: PathBuf::from("/opt/isce_stack"),
            processor: ProcessorKind::Stripmap,
        };
        let runner = Recorder(RefCell::new(Vec::new()));

        prepare_raw_data(Sensor::Alos2, &config, temp.path(), &context, &runner).unwrap();

        let calls = runner.0.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].command.starts_with("prepSlcALOS2.py"));
        assert!(calls[0].command.contains("--polarization HH"));
        assert!(calls[1].command.contains("run_unPackALOS2"));
    }

    #[test]
    fn test_prepare_raw_data_alos_fbd2fbs_flag() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("run_unPackALOS"), "unpack 20140825\n").unwrap();

        let config = config_from(&[("processor", "stripmapStack")]);
        let context = ExecContext {
            stack_home: PathBuf::from("/opt/isce_stack"),
            processor: ProcessorKind::Stripmap,
        };
        let runner = Recorder(RefCell::new(Vec::new()));

        prepare_raw_data(Sensor::Alos, &config, temp.path(), &context, &runner).unwrap();

        let calls = runner.0.borrow();
        // fbd2fbs defaults on for ALOS-1.
        assert!(calls[0].command.contains("--dual2single"));
    }
}
