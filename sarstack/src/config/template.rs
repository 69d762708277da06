//! Template file reader.
//!
//! Templates are flat text files of `isce.<option> = value  # comment`
//! lines. The reader strips comments and blank lines, keeps only the
//! `isce.` namespace (prefix removed), and normalizes the handful of
//! legacy dotted option names to their dot-free forms.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::ConfigError;

/// Namespace prefix selecting the options this crate consumes.
pub const KEY_PREFIX: &str = "isce.";

/// Raw option name → raw textual value, as read from a template file.
pub type TemplateMap = BTreeMap<String, String>;

/// Legacy dotted names still found in circulating templates.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("ALOS.fbd2fbs", "alosFbd2fbs"),
    ("ALOS2.polarization", "alos2Polarization"),
    ("numConnection.Ion", "numConnectionIon"),
];

/// Read a template file into a flat key/value mapping.
///
/// Lines outside the `isce.` namespace are ignored, as are blank lines and
/// comment lines. Inline `#` comments are stripped from values.
pub fn read_template(path: &Path) -> Result<TemplateMap, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::TemplateRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_template(&content))
}

/// Parse template text into a flat key/value mapping.
pub fn parse_template(content: &str) -> TemplateMap {
    let mut map = TemplateMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, rest)) = line.split_once('=') else {
            continue;
        };
        let Some(key) = key.trim().strip_prefix(KEY_PREFIX) else {
            continue;
        };

        // Strip inline comments; everything after the first '#' is prose.
        let value = match rest.split_once('#') {
            Some((v, _)) => v.trim(),
            None => rest.trim(),
        };
        if value.is_empty() {
            continue;
        }

        map.insert(normalize_key(key), value.to_string());
    }

    map
}

fn normalize_key(key: &str) -> String {
    for (legacy, canonical) in LEGACY_KEYS {
        if key == *legacy {
            return (*canonical).to_string();
        }
    }
    key.to_string()
}
