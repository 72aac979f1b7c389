//! Error taxonomy for configuration resolution.
//!
//! Every failure is raised synchronously during merge or validation and is
//! never retried: it is either a schema declaration bug or bad user input.
//! Messages are meant to be shown to the operator verbatim.

use trainconf_schema::SchemaError;

use crate::validate::ValidationError;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Type mismatch at '{path}': expected {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Invalid choice at '{path}': {value} is not one of [{allowed}]")]
    InvalidChoice {
        path: String,
        value: String,
        allowed: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Incompatible options: '{path}' requires '{requires}' ({reason})")]
    IncompatibleOptions {
        path: String,
        requires: String,
        reason: String,
    },

    #[error("Unknown configuration section '{0}'")]
    UnknownSection(String),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{0}' given more than once (name and alias)")]
    DuplicateField(String),

    #[error("Training policy at '{path}' is resolved as '{resolved}', cannot apply '{requested}'")]
    VariantConflict {
        path: String,
        resolved: String,
        requested: String,
    },

    #[error("Run timestamp at '{0}' is already set and cannot be cleared")]
    TimestampCleared(String),

    #[error("Environment variable {var} must be an integer, got '{value}'")]
    InvalidEnvironment { var: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to decode merged configuration: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn mismatch(path: &str, expected: impl Into<String>, found: &serde_json::Value) -> Self {
        ConfigError::TypeMismatch {
            path: path.to_string(),
            expected: expected.into(),
            found: describe_value(found),
        }
    }
}

/// Short description of a JSON value for error messages.
fn describe_value(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(items) => format!("list of {} item(s)", items.len()),
        Value::Object(_) => "mapping".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_mismatch_names_path() {
        let err = ConfigError::mismatch("train.epoch", "integer", &json!("three"));
        assert_eq!(
            err.to_string(),
            "Type mismatch at 'train.epoch': expected integer, got string \"three\""
        );
    }

    #[test]
    fn test_schema_error_converts() {
        let err: ConfigError = SchemaError::MissingDefault("seed".to_string()).into();
        assert!(err.to_string().contains("neither a default nor a default factory"));
    }
}
