//! Stage catalog: discovery and ordering of run-file scripts.
//!
//! The external plan generator materializes the pipeline as numbered
//! scripts in `run_files/` (`run_01_unpack_topo_reference`,
//! `run_02_unpack_secondary_slc`, ...). Discovery deletes leftover
//! `.job` descriptors, parses the numeric prefix of each remaining
//! script, and returns the stages sorted numerically by ordinal, which
//! sidesteps lexicographic surprises when prefixes are not zero-padded.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// Stage names containing any of these keywords spawn `OMP_NUM_THREADS`
/// threads per worker process and need their process budget divided.
pub const HEAVY_STAGE_KEYWORDS: &[&str] = &["topo", "geo2rdr", "resamp"];

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The run-file directory is missing or not a directory
    #[error("no run_files directory found at {path}")]
    NotADirectory { path: PathBuf },

    /// Two scripts carry the same numeric prefix
    #[error("duplicate stage number {ordinal} ({first} and {second})")]
    DuplicateOrdinal {
        ordinal: u32,
        first: String,
        second: String,
    },

    /// Filesystem error during the scan
    #[error("failed to scan run_files: {0}")]
    Io(#[from] std::io::Error),
}

/// How a stage consumes the process budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// One single-threaded worker per process slot
    Ordinary,
    /// Workers spawn multiple threads each; budget must be divided
    Heavy,
}

/// One unit of pipeline work, backed by an executable script of commands.
#[derive(Debug, Clone)]
pub struct Stage {
    /// 1-based position encoded in the script's numeric prefix
    pub ordinal: u32,
    /// Descriptive suffix of the script name
    pub name: String,
    /// Full path to the script
    pub script: PathBuf,
    /// Resource class derived from the stage name
    pub resource_class: ResourceClass,
}

impl Stage {
    /// Number of command lines in the stage script. Workers beyond this
    /// count would sit idle, so process budgets are clamped to it.
    pub fn command_line_count(&self) -> std::io::Result<usize> {
        let content = std::fs::read_to_string(&self.script)?;
        Ok(content.lines().count())
    }
}

/// `run_<1-2 digit ordinal>_<descriptive suffix>`, extensionless.
fn stage_script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^run_(\d{1,2})_([^.]+)$").unwrap())
}

/// Classify a stage by its descriptive name.
pub fn resource_class_for(name: &str) -> ResourceClass {
    if HEAVY_STAGE_KEYWORDS.iter().any(|kw| name.contains(kw)) {
        ResourceClass::Heavy
    } else {
        ResourceClass::Ordinary
    }
}

/// Discover the ordered stage sequence in `run_files_dir`.
///
/// Leftover `run_*_*.job` descriptor files are deleted before the scan is
/// finalized. The result is sorted by numeric ordinal.
pub fn discover(run_files_dir: &Path) -> Result<Vec<Stage>, CatalogError> {
    if !run_files_dir.is_dir() {
        return Err(CatalogError::NotADirectory {
            path: run_files_dir.to_path_buf(),
        });
    }

    let mut stages: Vec<Stage> = Vec::new();
    for entry in std::fs::read_dir(run_files_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        // Scheduler byproducts from a previous submission; not stages.
        // Only the run_<ordinal>_<name> shape, so unrelated .job files
        // survive the sweep.
        let job_leftover = file_name
            .strip_prefix("run_")
            .and_then(|rest| rest.strip_suffix(".job"))
            .is_some_and(|middle| middle.contains('_'));
        if job_leftover {
            std::fs::remove_file(&path)?;
            debug!(file = %path.display(), "removed leftover job descriptor");
            continue;
        }

        let Some(captures) = stage_script_pattern().captures(file_name) else {
            continue;
        };
        let ordinal: u32 = captures[1].parse().unwrap_or(0);
        if ordinal == 0 {
            continue;
        }
        let name = captures[2].to_string();

        stages.push(Stage {
            ordinal,
            resource_class: resource_class_for(&name),
            name,
            script: path,
        });
    }

    stages.sort_by_key(|stage| stage.ordinal);

    for pair in stages.windows(2) {
        if pair[0].ordinal == pair[1].ordinal {
            return Err(CatalogError::DuplicateOrdinal {
                ordinal: pair[0].ordinal,
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }
    for (index, stage) in stages.iter().enumerate() {
        if stage.ordinal as usize != index + 1 {
            warn!(
                ordinal = stage.ordinal,
                position = index + 1,
                name = %stage.name,
                "stage numbering is not contiguous"
            );
        }
    }

    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_discover_orders_numerically() {
        let temp = TempDir::new().unwrap();
        // Unpadded prefixes would sort wrong lexicographically.
        touch(temp.path(), "run_10_merge", "cmd\n");
        touch(temp.path(), "run_2_average_baseline", "cmd\n");
        touch(temp.path(), "run_1_unpack_topo_reference", "cmd\n");

        let stages = discover(temp.path()).unwrap();
        let ordinals: Vec<u32> = stages.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, [1, 2, 10]);
        assert_eq!(stages[0].name, "unpack_topo_reference");
    }

    #[test]
    fn test_discover_skips_files_with_extensions() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "run_01_unpack", "cmd\n");
        touch(temp.path(), "run_01_unpack.log", "log\n");
        touch(temp.path(), "README.txt", "doc\n");

        let stages = discover(temp.path()).unwrap();
        assert_eq!(stages.len(), 1);
    }

    #[test]
    fn test_discover_deletes_job_descriptors() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "run_01_unpack", "cmd\n");
        touch(temp.path(), "run_01_unpack_0.job", "#SBATCH\n");

        let stages = discover(temp.path()).unwrap();
        assert_eq!(stages.len(), 1);
        assert!(!temp.path().join("run_01_unpack_0.job").exists());
    }

    #[test]
    fn test_discover_keeps_job_files_outside_stage_shape() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "run_01_unpack", "cmd\n");
        // No second underscore between prefix and extension.
        touch(temp.path(), "run_xyz.job", "#SBATCH\n");
        touch(temp.path(), "other.job", "#SBATCH\n");

        let stages = discover(temp.path()).unwrap();
        assert_eq!(stages.len(), 1);
        assert!(temp.path().join("run_xyz.job").exists());
        assert!(temp.path().join("other.job").exists());
    }

    #[test]
    fn test_discover_missing_directory() {
        let err = discover(Path::new("/no/such/run_files")).unwrap_err();
        assert!(matches!(err, CatalogError::NotADirectory { .. }));
    }

    #[test]
    fn test_discover_rejects_duplicate_ordinals() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "run_1_unpack", "cmd\n");
        touch(temp.path(), "run_01_unpack_again", "cmd\n");

        let err = discover(temp.path()).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateOrdinal { ordinal: 1, .. }));
    }

    #[test]
    fn test_resource_class_from_keywords() {
        assert_eq!(resource_class_for("topo_reference"), ResourceClass::Heavy);
        assert_eq!(resource_class_for("geo2rdr"), ResourceClass::Heavy);
        // Substring match: "resample" contains "resamp".
        assert_eq!(resource_class_for("fullBurst_resample"), ResourceClass::Heavy);
        assert_eq!(resource_class_for("unpack_secondary_slc"), ResourceClass::Ordinary);
        assert_eq!(resource_class_for("generate_burst_igram"), ResourceClass::Ordinary);
    }

    #[test]
    fn test_command_line_count() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "run_1_unpack", "cmd one\ncmd two\ncmd three\n");
        let stages = discover(temp.path()).unwrap();
        assert_eq!(stages[0].command_line_count().unwrap(), 3);
    }
}
