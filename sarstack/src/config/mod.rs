//! Template configuration: reading, schema, and resolution.
//!
//! A project is described by a flat `isce.option = value` template file.
//! [`read_template`] turns the file into a raw key/value mapping,
//! [`resolve`] merges it with the declared [`schema`], translates special
//! values, and expands paths, producing the immutable [`ResolvedConfig`]
//! every downstream component consumes.

mod resolve;
mod template;
mod value;

pub mod schema;

pub use resolve::{parse_value, resolve, AUTO};
pub use template::{parse_template, read_template, TemplateMap, KEY_PREFIX};
pub use value::{ResolvedConfig, Value};

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the template file
    #[error("failed to read template file {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No processor discriminant was supplied
    #[error("missing stack processor option 'processor'")]
    MissingProcessor,

    /// The processor discriminant is not a recognized stack processor
    #[error("unrecognized stack processor '{value}', supported: topsStack, stripmapStack")]
    UnknownProcessor { value: String },

    /// A value failed typed parsing
    #[error("invalid value for option '{key}': '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// An option required by the current workflow is unset
    #[error("required option '{key}' is not set")]
    MissingOption { key: String },
}
