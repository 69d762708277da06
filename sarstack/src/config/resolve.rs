//! Template resolution: defaults, typed coercion, and path expansion.
//!
//! Resolution runs in a fixed order, each step operating on the output of
//! the previous one:
//!
//! 1. drop options whose raw value is the `auto` sentinel;
//! 2. back-fill every declared option absent from the mapping with its
//!    schema default (which may itself be null);
//! 3. translate special values per declared kind (`yes/no/true/false` for
//!    booleans, `none` for nullable options) and parse numerics/lists;
//! 4. expand filesystem wildcards for glob-accepting path options, taking
//!    the first match or null;
//! 5. expand every `*File`/`*Dir` option holding a value: `~`, then
//!    environment variables, then resolution to an absolute path.
//!
//! The resolver performs no filesystem writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::schema::{OptionSpec, ValueKind};
use super::template::TemplateMap;
use super::value::{ResolvedConfig, Value};
use super::ConfigError;
use crate::processor::ProcessorKind;

/// Raw value sentinel restoring an option to "unset" so defaulting applies.
pub const AUTO: &str = "auto";

/// Resolve a raw template mapping against a declared option schema.
///
/// Fails with [`ConfigError::UnknownProcessor`] if the processor
/// discriminant is missing or unrecognized. Options present in the raw
/// mapping but absent from the schema are carried through as text.
pub fn resolve(raw: &TemplateMap, schema: &[OptionSpec]) -> Result<ResolvedConfig, ConfigError> {
    // Step 1: the `auto` sentinel means "use the default".
    let mut text_map: BTreeMap<&str, &str> = raw
        .iter()
        .filter(|(_, value)| value.as_str() != AUTO)
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    // Step 2: back-fill declared options from their defaults.
    for spec in schema {
        if !text_map.contains_key(spec.key) {
            if let Some(default) = spec.default {
                text_map.insert(spec.key, default);
            }
        }
    }

    // Step 3: typed special-value translation and parsing.
    let mut options: BTreeMap<String, Option<Value>> = BTreeMap::new();
    for (key, text) in &text_map {
        let value = match schema.iter().find(|spec| spec.key == *key) {
            Some(spec) => parse_value(spec, text)?,
            // Undeclared keys ride along untyped.
            None => Some(Value::Text((*text).to_string())),
        };
        options.insert((*key).to_string(), value);
    }
    // Declared options with no default and no raw value are present but unset.
    for spec in schema {
        options.entry(spec.key.to_string()).or_insert(None);
    }

    // Step 4: wildcard expansion for glob-accepting path options.
    for spec in schema.iter().filter(|spec| spec.glob) {
        if let Some(Some(Value::Text(pattern))) = options.get(spec.key) {
            if pattern.contains('*') || pattern.contains('?') {
                let expanded = first_glob_match(pattern).map(|p| {
                    Value::Text(p.to_string_lossy().into_owned())
                });
                options.insert(spec.key.to_string(), expanded);
            }
        }
    }

    // Step 5: absolute-path expansion for File/Dir options holding a value.
    for (key, slot) in options.iter_mut() {
        if !(key.ends_with("File") || key.ends_with("Dir")) {
            continue;
        }
        if let Some(Value::Text(text)) = slot {
            let expanded = expand_path(text).map_err(|reason| ConfigError::InvalidValue {
                key: key.clone(),
                value: text.clone(),
                reason,
            })?;
            *slot = Some(Value::Text(expanded.to_string_lossy().into_owned()));
        }
    }

    // Validate the processor discriminant.
    let processor = match options.get("processor").and_then(|v| v.as_ref()) {
        Some(Value::Text(name)) => name
            .parse::<ProcessorKind>()
            .map_err(|_| ConfigError::UnknownProcessor {
                value: name.clone(),
            })?,
        _ => return Err(ConfigError::MissingProcessor),
    };

    Ok(ResolvedConfig::new(processor, options))
}

/// Parse one raw textual value according to its declared kind.
///
/// Nullable options translate a case-insensitive `none` to unset before
/// any kind-specific parsing; boolean options accept the four boolean
/// words case-insensitively. No other textual comparison happens, so a
/// path whose filename is literally `none` survives when the option is
/// not nullable.
pub fn parse_value(spec: &OptionSpec, text: &str) -> Result<Option<Value>, ConfigError> {
    if spec.nullable && text.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let value = match spec.kind {
        ValueKind::Bool => match text.to_ascii_lowercase().as_str() {
            "yes" | "true" => Value::Bool(true),
            "no" | "false" => Value::Bool(false),
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: spec.key.to_string(),
                    value: text.to_string(),
                    reason: "expected yes/no/true/false".to_string(),
                })
            }
        },
        ValueKind::Int => Value::Int(text.parse().map_err(|_| ConfigError::InvalidValue {
            key: spec.key.to_string(),
            value: text.to_string(),
            reason: "expected a whole number".to_string(),
        })?),
        ValueKind::Float => Value::Float(text.parse().map_err(|_| ConfigError::InvalidValue {
            key: spec.key.to_string(),
            value: text.to_string(),
            reason: "expected a number".to_string(),
        })?),
        ValueKind::Text | ValueKind::Path => Value::Text(text.to_string()),
        ValueKind::List => Value::List(
            text.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        ),
    };
    Ok(Some(value))
}

/// First filesystem match for a wildcard pattern, in alphabetical order.
fn first_glob_match(pattern: &str) -> Option<PathBuf> {
    glob::glob(pattern).ok()?.flatten().next()
}

/// Expand `~`, then environment variables, then resolve to absolute form.
fn expand_path(text: &str) -> Result<PathBuf, String> {
    let tilde_expanded = expand_tilde(text);
    let env_expanded = expand_env_vars(&tilde_expanded.to_string_lossy());
    std::path::absolute(Path::new(&env_expanded))
        .map_err(|e| format!("cannot resolve to an absolute path: {}", e))
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Substitute `$VAR` and `${VAR}` references from the environment.
/// Unset variables are left verbatim.
fn expand_env_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let rest = &text[i + 1..];
        let (name, consumed) = if let Some(inner) = rest.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => (&inner[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            (&rest[..end], end)
        };

        if name.is_empty() {
            out.push('$');
            continue;
        }

        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(&text[i + 1..i + 1 + consumed]);
            }
        }
        // Skip the consumed variable reference.
        for _ in 0..consumed {
            chars.next();
        }
    }

    out
}
