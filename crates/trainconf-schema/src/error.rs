//! Schema declaration errors.

/// Errors raised while declaring a schema table.
///
/// These always indicate a bug in the schema declaration itself, never bad
/// user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Field '{0}' declares neither a default nor a default factory")]
    MissingDefault(String),

    #[error("Field '{0}' declares both a default and a default factory")]
    ConflictingDefault(String),

    #[error("Record '{record}' declares '{name}' more than once")]
    DuplicateField { record: String, name: String },

    #[error("Tagged field has no variant '{0}'")]
    UnknownVariant(String),
}
