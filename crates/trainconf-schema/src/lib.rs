//! Static schema tables for trainconf.
//!
//! A schema describes each configuration field once: its semantic type, a
//! single default source, help text, an optional choice set, and whether UI
//! generators should show it. Schemas are plain values kept apart from the
//! runtime configuration tree; the merge engine reads them to check and
//! coerce override input.

mod error;
mod field;
mod record;

pub use error::SchemaError;
pub use field::{DefaultSource, FieldBuilder, FieldKind, FieldSpec};
pub use record::{FieldDescriptor, RecordSchema, TaggedSchema, VariantSchema};
