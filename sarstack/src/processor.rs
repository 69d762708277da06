//! Stack processor kinds and their per-kind fixed knowledge.
//!
//! The two ISCE-2 stack processors share most configuration options but
//! differ in their plan-generation script, the stack subdirectory holding
//! their drivers, and the commands needed to reset a processing directory.
//! Everything per-kind is dispatched through exhaustive matching on
//! [`ProcessorKind`] so no string comparison leaks past config resolution.

use std::fmt;
use std::str::FromStr;

/// The ISCE-2 stack processor driving this project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    /// Sentinel-1 TOPS-mode stack processor.
    Tops,
    /// Stripmap-mode stack processor (ALOS, ALOS-2 and friends).
    Stripmap,
}

impl ProcessorKind {
    /// Subdirectory of the stack installation holding this kind's scripts.
    pub fn stack_subdir(&self) -> &'static str {
        match self {
            ProcessorKind::Tops => "topsStack",
            ProcessorKind::Stripmap => "stripmapStack",
        }
    }

    /// Plan-generation script invoked to materialize `configs/` and
    /// `run_files/`.
    pub fn plan_script(&self) -> &'static str {
        match self {
            ProcessorKind::Tops => "stackSentinel.py",
            ProcessorKind::Stripmap => "stackStripMap.py",
        }
    }

    /// Command block a user must run to reset the processing directory
    /// before re-processing from scratch.
    pub fn reset_commands(&self) -> &'static str {
        match self {
            ProcessorKind::Tops => {
                "------ Copy and paste the following commands to reset the process directory ----\n"
            }
            ProcessorKind::Stripmap => {
                "------ Copy and paste the following commands to reset the process directory ----\n\
                 rm -r baselines/ configs/ coregSLC/ geom_reference/ Igrams/ merged/ offsets/ \
                 refineSecondaryTiming/ run_* SLC/ referenceShelve/\n\
                 cd download\n\
                 rm -rf 20* AL*\n\
                 mv ARCHIVED_FILES/* .\n\
                 cd ..\n"
            }
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stack_subdir())
    }
}

impl FromStr for ProcessorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topsStack" => Ok(ProcessorKind::Tops),
            "stripmapStack" => Ok(ProcessorKind::Stripmap),
            _ => Err(()),
        }
    }
}
