//! Override sources: config files and `key.path=value` assignments.
//!
//! Sources are stacked in the order given with [`merge_layers`] and the
//! result is handed to the resolver as one override mapping. Each source is
//! recorded with its origin and, for files, the SHA-256 of the raw bytes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::merge::merge_layers;

/// Origin of an override source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverrideOrigin {
    File,
    Cli,
}

/// A contributing override source with provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverrideSource {
    pub origin: OverrideOrigin,

    /// File path (None for cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Ordered override layers; later layers win.
#[derive(Debug, Clone, Default)]
pub struct OverrideLayers {
    layers: Vec<Value>,
    sources: Vec<OverrideSource>,
}

impl OverrideLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `.toml` or `.json` file.
    pub fn push_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let (value, digest) = load_file(path)?;
        tracing::debug!(path = %path.display(), %digest, "Loaded override file");
        self.layers.push(value);
        self.sources.push(OverrideSource {
            origin: OverrideOrigin::File,
            path: Some(path.to_string_lossy().to_string()),
            digest: Some(digest),
        });
        Ok(())
    }

    /// Add `key.path=value` assignments as one layer.
    pub fn push_assignments<S: AsRef<str>>(&mut self, assignments: &[S]) -> Result<(), ConfigError> {
        if assignments.is_empty() {
            return Ok(());
        }
        self.layers.push(assignments_to_value(assignments)?);
        self.sources.push(OverrideSource {
            origin: OverrideOrigin::Cli,
            path: None,
            digest: None,
        });
        Ok(())
    }

    pub fn sources(&self) -> &[OverrideSource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Merge all layers into one override mapping.
    pub fn merged(&self) -> Value {
        match merge_layers(self.layers.clone()) {
            Value::Null => Value::Object(Map::new()),
            merged => merged,
        }
    }
}

/// Load and parse an override file, returning the value and digest.
///
/// The format follows the extension: `.json` is JSON, anything else TOML.
pub fn load_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::Parse(format!("{}: invalid UTF-8: {}", path.display(), e)))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let value = if is_json {
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: JSON parse error: {}", path.display(), e)))?
    } else {
        let table: toml::Table = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: TOML parse error: {}", path.display(), e)))?;
        toml_to_json(toml::Value::Table(table))
    };

    Ok((value, digest))
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let map: Map<String, Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}

/// Parse one `key.path=value` assignment.
///
/// The value is read as a TOML literal (`3`, `true`, `[1, 2]`, `"x"`); text
/// that is not a valid literal is taken as a bare string.
pub fn parse_assignment(assignment: &str) -> Result<(Vec<String>, Value), ConfigError> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::Parse(format!("expected KEY=VALUE, got '{}'", assignment)))?;

    let path: Vec<String> = key.trim().split('.').map(str::to_string).collect();
    if path.iter().any(String::is_empty) {
        return Err(ConfigError::Parse(format!("invalid key '{}'", key.trim())));
    }

    let raw = raw.trim();
    let value = match toml::from_str::<toml::Table>(&format!("value = {}", raw)) {
        Ok(mut table) => table
            .remove("value")
            .map(toml_to_json)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Err(_) => Value::String(raw.to_string()),
    };

    Ok((path, value))
}

/// Build a nested override mapping from assignments. Later assignments to
/// the same key win.
pub fn assignments_to_value<S: AsRef<str>>(assignments: &[S]) -> Result<Value, ConfigError> {
    let layers = assignments
        .iter()
        .map(|assignment| {
            let (path, value) = parse_assignment(assignment.as_ref())?;
            Ok(nest(&path, value))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    Ok(merge_layers(layers))
}

fn nest(path: &[String], leaf: Value) -> Value {
    path.iter().rev().fold(leaf, |inner, key| {
        let mut map = Map::new();
        map.insert(key.clone(), inner);
        Value::Object(map)
    })
}
