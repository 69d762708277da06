//! Resolved option values and the resolved configuration map.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::ConfigError;
use crate::processor::ProcessorKind;

/// One resolved option value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// The fully resolved configuration for one run.
///
/// Every declared option is present as an entry after resolution; unset
/// options hold `None`. Apart from the DEM-file back-fill performed by the
/// artifact gate, the map is not mutated after construction.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Validated stack processor discriminant
    pub processor: ProcessorKind,
    options: BTreeMap<String, Option<Value>>,
}

impl ResolvedConfig {
    pub(super) fn new(
        processor: ProcessorKind,
        options: BTreeMap<String, Option<Value>>,
    ) -> Self {
        ResolvedConfig { processor, options }
    }

    /// The resolved value for `key`, or `None` if unset or undeclared.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key).and_then(|v| v.as_ref())
    }

    /// Whether `key` exists as an entry (set or unset).
    pub fn contains_key(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Number of option entries, unset ones included.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether the map holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Text value of `key`, if set.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text value of `key`, or a `ConfigError` naming the missing option.
    pub fn require_text(&self, key: &str) -> Result<&str, ConfigError> {
        self.text(key).ok_or_else(|| ConfigError::MissingOption {
            key: key.to_string(),
        })
    }

    /// Integer value of `key`, if set.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Integer value of `key`, or a `ConfigError` naming the missing option.
    pub fn require_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.int(key).ok_or_else(|| ConfigError::MissingOption {
            key: key.to_string(),
        })
    }

    /// Float value of `key`, if set.
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(Value::Float(x)) => Some(*x),
            Some(Value::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Boolean value of `key`; unset reads as `false`.
    pub fn bool_flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    /// Path value of `key`, if set.
    pub fn path(&self, key: &str) -> Option<PathBuf> {
        self.text(key).map(PathBuf::from)
    }

    /// List value of `key`, if set.
    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.get(key) {
            Some(Value::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Back-fill a path option. Used by the DEM artifact gate once the
    /// raster has been located or generated.
    pub fn set_path(&mut self, key: &str, path: &Path) {
        self.options.insert(
            key.to_string(),
            Some(Value::Text(path.to_string_lossy().into_owned())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResolvedConfig {
        let mut options = BTreeMap::new();
        options.insert("workflow".to_string(), Some(Value::Text("interferogram".into())));
        options.insert("numProcess".to_string(), Some(Value::Int(4)));
        options.insert("filtStrength".to_string(), Some(Value::Float(0.5)));
        options.insert("useGPU".to_string(), Some(Value::Bool(false)));
        options.insert("demFile".to_string(), None);
        options.insert(
            "swathNum".to_string(),
            Some(Value::List(vec!["1".into(), "2".into()])),
        );
        ResolvedConfig::new(ProcessorKind::Tops, options)
    }

    #[test]
    fn test_typed_accessors() {
        let config = sample();
        assert_eq!(config.text("workflow"), Some("interferogram"));
        assert_eq!(config.int("numProcess"), Some(4));
        assert_eq!(config.float("filtStrength"), Some(0.5));
        assert!(!config.bool_flag("useGPU"));
        assert_eq!(config.list("swathNum").unwrap().len(), 2);
    }

    #[test]
    fn test_unset_option_is_present_but_none() {
        let config = sample();
        assert!(config.contains_key("demFile"));
        assert!(config.get("demFile").is_none());
        assert!(config.path("demFile").is_none());
    }

    #[test]
    fn test_require_names_the_offending_key() {
        let config = sample();
        let err = config.require_text("demFile").unwrap_err();
        assert!(err.to_string().contains("demFile"));
    }

    #[test]
    fn test_set_path_back_fills() {
        let mut config = sample();
        config.set_path("demFile", Path::new("/data/DEM/gsi10m.dem.wgs84"));
        assert_eq!(
            config.path("demFile").unwrap(),
            PathBuf::from("/data/DEM/gsi10m.dem.wgs84")
        );
    }

    #[test]
    fn test_int_coerces_to_float_but_not_reverse() {
        let config = sample();
        assert_eq!(config.float("numProcess"), Some(4.0));
        assert_eq!(config.int("filtStrength"), None);
    }
}
