//! Declared option schema: kinds, defaults, and per-processor scoping.
//!
//! Every template option is declared here with its value kind, so that
//! special-value translation during resolution is typed rather than a
//! blanket textual comparison: only boolean options recognize the
//! `yes/no/true/false` words, and only nullable options recognize `none`.
//! A path whose filename is literally `none` is left alone.

/// The declared kind of an option's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `yes`/`no`/`true`/`false`, case-insensitive
    Bool,
    /// Whole number
    Int,
    /// Decimal number
    Float,
    /// Free text
    Text,
    /// Comma-separated list of text items
    List,
    /// Filesystem path; expanded to absolute form during resolution
    Path,
}

/// Which processor kind an option belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionScope {
    /// Shared by both stack processors
    Common,
    /// topsStack only
    Tops,
    /// stripmapStack only
    Stripmap,
}

/// Declaration of one template option.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Dot-free option name as it appears after the `isce.` prefix
    pub key: &'static str,
    /// Declared value kind
    pub kind: ValueKind,
    /// Which workflow(s) consume this option
    pub scope: OptionScope,
    /// Default in template notation; `None` means "no default, stays
    /// unset until a workflow that requires it errors"
    pub default: Option<&'static str>,
    /// Whether the literal `none` resets this option to unset
    pub nullable: bool,
    /// Whether the value may contain filesystem wildcards to expand
    pub glob: bool,
}

impl OptionSpec {
    const fn new(key: &'static str, kind: ValueKind, scope: OptionScope) -> Self {
        OptionSpec {
            key,
            kind,
            scope,
            default: None,
            nullable: false,
            glob: false,
        }
    }

    const fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    const fn glob(mut self) -> Self {
        self.glob = true;
        self
    }
}

use OptionScope::{Common, Stripmap, Tops};
use ValueKind::{Bool, Float, Int, List, Path, Text};

/// The full option table for both stack processors.
///
/// Legacy dotted option names (`ALOS.fbd2fbs`, `ALOS2.polarization`) are
/// normalized to dot-free camelCase by the template reader before lookup.
pub const SCHEMA: &[OptionSpec] = &[
    // Common options
    OptionSpec::new("processor", Text, Common).default_value("topsStack"),
    OptionSpec::new("workflow", Text, Common).default_value("interferogram"),
    OptionSpec::new("demSNWE", Text, Common).nullable(),
    OptionSpec::new("demFile", Path, Common).nullable().glob(),
    OptionSpec::new("demSource", Text, Common).default_value("srtm1"),
    OptionSpec::new("demFillValue", Int, Common).default_value("-32768"),
    OptionSpec::new("demBuffer", Float, Common).default_value("3"),
    OptionSpec::new("boundingBox", Text, Common).nullable(),
    OptionSpec::new("referenceDate", Text, Common).nullable(),
    OptionSpec::new("azimuthLooks", Int, Common).default_value("3"),
    OptionSpec::new("rangeLooks", Int, Common).default_value("9"),
    OptionSpec::new("filtStrength", Float, Common).default_value("0.5"),
    OptionSpec::new("unwrapMethod", Text, Common).default_value("snaphu"),
    OptionSpec::new("useGPU", Bool, Common).default_value("no"),
    OptionSpec::new("numProcess", Int, Common).default_value("4"),
    // topsStack options
    OptionSpec::new("virtualMerge", Bool, Tops).default_value("no"),
    OptionSpec::new("coregistration", Text, Tops).default_value("geometry"),
    OptionSpec::new("swathNum", List, Tops).default_value("1,2,3"),
    OptionSpec::new("numConnection", Int, Tops).default_value("3"),
    OptionSpec::new("orbitDir", Path, Tops).default_value("~/bak/aux/aux_poeorb/"),
    OptionSpec::new("auxDir", Path, Tops).default_value("~/bak/aux/aux_cal/"),
    OptionSpec::new("startDate", Text, Tops).nullable(),
    OptionSpec::new("endDate", Text, Tops).nullable(),
    OptionSpec::new("numProcess4topo", Int, Tops).nullable(),
    OptionSpec::new("numConnectionIon", Int, Tops).default_value("3"),
    OptionSpec::new("paramIonFile", Path, Tops).nullable(),
    // stripmapStack options
    OptionSpec::new("zeroDoppler", Bool, Stripmap).default_value("no"),
    OptionSpec::new("focus", Bool, Stripmap).default_value("yes"),
    OptionSpec::new("alosFbd2fbs", Bool, Stripmap).default_value("yes"),
    OptionSpec::new("alos2Polarization", Text, Stripmap).default_value("HH"),
    OptionSpec::new("maxTempBaseline", Int, Stripmap).default_value("1800"),
    OptionSpec::new("maxPerpBaseline", Int, Stripmap).default_value("1800"),
    OptionSpec::new("applyWaterMask", Bool, Stripmap).default_value("yes"),
];

/// Look up an option declaration by key.
pub fn lookup(key: &str) -> Option<&'static OptionSpec> {
    SCHEMA.iter().find(|spec| spec.key == key)
}
