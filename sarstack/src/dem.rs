//! DEM artifact gate.
//!
//! DEM acquisition is the most expensive precondition of a stack run, so
//! [`ensure_dem`] is an idempotent gate: an already-configured raster or
//! one found in the `DEM/` directory short-circuits generation entirely,
//! and only when neither exists is the external DEM tool invoked.
//!
//! Generation works off a bounding box taken from `demSNWE`, or derived
//! from `boundingBox` expanded by `demBuffer` degrees on every side.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, ResolvedConfig};
use crate::coord::{BoundingBox, BoundsError};
use crate::tools::{ToolError, ToolInvocation, ToolRunner};

/// Directory under the project root holding DEM rasters.
pub const DEM_DIR: &str = "DEM";

/// Glob pattern matching previously generated rasters in `DEM/`.
pub const EXISTING_DEM_PATTERN: &str = "*.dem.wgs84";

/// DEM acquisition errors.
#[derive(Debug, Error)]
pub enum DemError {
    /// Configuration problem (missing bounds, bad option)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bounding box text failed to parse
    #[error(transparent)]
    Bounds(#[from] BoundsError),

    /// The DEM tool could not be launched
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The DEM tool exited non-zero
    #[error("DEM generation failed: '{command}' exited with status {code}")]
    ExternalTool { command: String, code: i32 },

    /// The tool claimed success but no raster matched the output pattern
    #[error("no DEM file found matching '{pattern}'")]
    ArtifactNotFound { pattern: String },

    /// Filesystem error while preparing the DEM directory
    #[error("DEM directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// The external program family generating the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemSource {
    /// SRTM 1-arcsecond tiles
    Srtm1,
    /// SRTM 3-arcsecond tiles
    Srtm3,
    /// NASADEM tiles
    NasaDem,
    /// DEHM from GSI Japan
    GsiDehm,
}

impl DemSource {
    /// Value passed to the stitcher's `--source` flag.
    pub fn source_flag(&self) -> &'static str {
        match self {
            DemSource::Srtm1 => "1",
            DemSource::Srtm3 => "3",
            DemSource::NasaDem => "nasadem",
            DemSource::GsiDehm => "",
        }
    }

    /// Whether this provider accepts whole-degree bounds only.
    pub fn integer_bounds(&self) -> bool {
        !matches!(self, DemSource::GsiDehm)
    }
}

impl FromStr for DemSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "srtm1" => Ok(DemSource::Srtm1),
            "srtm3" => Ok(DemSource::Srtm3),
            "nasadem" => Ok(DemSource::NasaDem),
            "gsi_dehm" => Ok(DemSource::GsiDehm),
            _ => Err(()),
        }
    }
}

/// Ensure the configuration points at an existing DEM raster.
///
/// Policy, first match wins:
///
/// 1. the configured `demFile` exists on disk: use as-is, no tool calls;
/// 2. a raster matching [`EXISTING_DEM_PATTERN`] already sits in `DEM/`:
///    adopt the first match;
/// 3. generate one with the configured provider and adopt the result.
///
/// On success the config's `demFile` option points at an existing file.
pub fn ensure_dem(
    config: &mut ResolvedConfig,
    project_dir: &Path,
    tools: &dyn ToolRunner,
) -> Result<(), DemError> {
    let dem_dir = project_dir.join(DEM_DIR);
    std::fs::create_dir_all(&dem_dir)?;

    if let Some(dem_file) = config.path("demFile") {
        if dem_file.is_file() {
            info!(dem = %dem_file.display(), "input DEM file exists, skipping generation");
            return Ok(());
        }
    }

    let existing = dem_dir.join(EXISTING_DEM_PATTERN);
    if let Some(found) = first_match(&existing.to_string_lossy()) {
        info!(dem = %found.display(), "using existing DEM file");
        config.set_path("demFile", &found);
        return Ok(());
    }

    info!("generating new DEM");
    let bbox = dem_bounding_box(config)?;
    let source = dem_source(config)?;
    let fill_value = config.require_int("demFillValue")?;

    let (command, output_pattern) = compose_generation(&dem_dir, source, &bbox, fill_value);
    info!(command = %command, "invoking DEM generation tool");

    let invocation = ToolInvocation::new(command.clone()).in_dir(&dem_dir);
    let code = tools.run(&invocation)?;
    if code != 0 {
        return Err(DemError::ExternalTool { command, code });
    }

    remove_geoid_sidecars(&output_pattern);

    match first_match(&output_pattern) {
        Some(found) => {
            info!(dem = %found.display(), "DEM generated");
            config.set_path("demFile", &found);
            Ok(())
        }
        None => Err(DemError::ArtifactNotFound {
            pattern: output_pattern,
        }),
    }
}

/// The bounding box the DEM must cover: explicit `demSNWE`, or the scene
/// `boundingBox` buffered by `demBuffer` degrees.
pub fn dem_bounding_box(config: &ResolvedConfig) -> Result<BoundingBox, DemError> {
    if let Some(text) = config.text("demSNWE") {
        return Ok(BoundingBox::parse(text)?);
    }
    if let Some(text) = config.text("boundingBox") {
        let margin = config.float("demBuffer").unwrap_or(0.0);
        return Ok(BoundingBox::parse(text)?.buffered(margin));
    }
    Err(ConfigError::MissingOption {
        key: "demSNWE".to_string(),
    }
    .into())
}

fn dem_source(config: &ResolvedConfig) -> Result<DemSource, DemError> {
    let name = config.require_text("demSource")?;
    name.parse().map_err(|_| {
        ConfigError::InvalidValue {
            key: "demSource".to_string(),
            value: name.to_string(),
            reason: "expected srtm1, srtm3, nasadem or gsi_dehm".to_string(),
        }
        .into()
    })
}

/// Compose the generation command line and the glob pattern locating the
/// produced raster.
fn compose_generation(
    dem_dir: &Path,
    source: DemSource,
    bbox: &BoundingBox,
    fill_value: i64,
) -> (String, String) {
    match source {
        DemSource::GsiDehm => {
            let command = format!("dem_gsi.py --bbox {}", bbox.to_arg_string());
            let pattern = dem_dir.join("gsi10m.dem.wgs84");
            (command, pattern.to_string_lossy().into_owned())
        }
        _ => {
            // The SRTM stitcher takes whole-degree bounds only.
            let [s, n, w, e] = bbox.snapped_outward();
            let mut command = format!("dem.py --action stitch --bbox {} {} {} {}", s, n, w, e);
            command.push_str(&format!(" --report --source {}", source.source_flag()));
            command.push_str(&format!(" --correct --filling --filling_value {}", fill_value));
            let pattern = dem_dir.join("demLat*.dem.wgs84");
            (command, pattern.to_string_lossy().into_owned())
        }
    }
}

/// Delete the geoid-referenced byproducts the stitcher leaves next to the
/// WGS84 raster (`<stem>`, `<stem>.xml`, `<stem>.vrt`).
fn remove_geoid_sidecars(wgs84_pattern: &str) {
    let stem = wgs84_pattern.replace(".wgs84", "");
    for ext in ["", ".xml", ".vrt"] {
        let pattern = format!("{}{}", stem, ext);
        let Ok(paths) = glob::glob(&pattern) else {
            continue;
        };
        for path in paths.flatten() {
            if std::fs::remove_file(&path).is_ok() {
                debug!(file = %path.display(), "removed DEM byproduct");
            }
        }
    }
}

fn first_match(pattern: &str) -> Option<PathBuf> {
    glob::glob(pattern).ok()?.flatten().find(|p| p.is_file())
}
