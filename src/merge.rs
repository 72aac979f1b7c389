//! Configuration merge logic
//!
//! Raw layers are stacked with [`deep_merge`] / [`merge_layers`]:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)
//!
//! [`merge_overrides`] applies the same overlay semantics to a typed tree,
//! checking every key against the schema and coercing every value to its
//! declared type on the way in.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use trainconf_schema::{FieldKind, FieldSpec, RecordSchema, SchemaError, TaggedSchema};

use crate::config::{ConfigTree, PolicyKind};
use crate::env::Environment;
use crate::error::ConfigError;
use crate::variant;

/// strftime pattern of synthesized run timestamps. Sorts chronologically.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Path reported for errors about the override mapping as a whole.
const ROOT_PATH: &str = "<root>";

const TIMESTAMP_PATH: &str = "train.timestamp";

/// Deep merge two JSON values.
///
/// Merge semantics:
/// - Objects: deep-merge by key (recursive)
/// - Arrays: REPLACE (second wins entirely)
/// - Scalars: override (second wins)
/// - Null: override (null can override any value)
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both objects: deep merge
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays: REPLACE (no concatenation)
        (Value::Array(_), overlay @ Value::Array(_)) => overlay,

        // Scalars and any other case: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge multiple raw layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Overlay a raw override mapping onto `base`.
///
/// Leaves present in `overrides` replace the base value, absent leaves keep
/// it, and nested sections merge key by key. The training-policy variant is
/// resolved from the override keys before that field is touched. When the
/// merged tree has no run timestamp one is taken from `env`'s clock and
/// appended to `train.output_dir`, which also locks the variant. A stamped
/// base keeps its timestamp; clearing it is an error.
pub fn merge_overrides(
    schema: &RecordSchema,
    base: ConfigTree,
    overrides: Value,
    env: &impl Environment,
) -> Result<ConfigTree, ConfigError> {
    let overrides = match overrides {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(ConfigError::mismatch(ROOT_PATH, "mapping", &other)),
    };

    if let Some(unknown) = overrides.keys().find(|key| schema.field(key).is_none()) {
        return Err(ConfigError::UnknownSection(unknown.clone()));
    }

    let overlay = Overlay {
        variant_locked: base.variant_locked(),
    };
    let mut merged = base.to_value()?;
    overlay.merge_record(schema, &mut merged, overrides, "")?;

    let mut tree = ConfigTree::from_value(merged)?;
    if overlay.variant_locked && tree.train.timestamp.is_empty() {
        return Err(ConfigError::TimestampCleared(TIMESTAMP_PATH.to_string()));
    }
    stamp_run_directory(&mut tree, env);
    Ok(tree)
}

/// Synthesize the run timestamp and output directory, once.
fn stamp_run_directory(tree: &mut ConfigTree, env: &impl Environment) {
    if !tree.train.timestamp.is_empty() {
        return;
    }

    let timestamp = env.now().format(TIMESTAMP_FORMAT).to_string();
    let output_dir = Path::new(&tree.train.output_dir)
        .join(&timestamp)
        .to_string_lossy()
        .into_owned();

    tracing::info!(%timestamp, %output_dir, "Synthesized run timestamp");

    tree.train.timestamp = timestamp;
    tree.train.output_dir = output_dir;
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

struct Overlay {
    variant_locked: bool,
}

impl Overlay {
    fn merge_record(
        &self,
        schema: &RecordSchema,
        base: &mut Value,
        overlay: Map<String, Value>,
        path: &str,
    ) -> Result<(), ConfigError> {
        if !base.is_object() {
            *base = Value::Object(Map::new());
        }
        let base_map = base
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownField(path.to_string()))?;

        let mut seen: HashSet<&'static str> = HashSet::new();
        for (key, value) in overlay {
            let field = schema
                .field(&key)
                .ok_or_else(|| ConfigError::UnknownField(join_path(path, &key)))?;
            let field_path = join_path(path, field.name());
            if !seen.insert(field.name()) {
                return Err(ConfigError::DuplicateField(field_path));
            }

            let slot = base_map
                .entry(field.name().to_string())
                .or_insert_with(|| field.default_value());
            self.merge_field(field, slot, value, &field_path)?;
        }
        Ok(())
    }

    fn merge_field(
        &self,
        field: &FieldSpec,
        slot: &mut Value,
        value: Value,
        path: &str,
    ) -> Result<(), ConfigError> {
        match field.kind() {
            FieldKind::Record(record) => match value {
                Value::Object(map) => self.merge_record(record, slot, map, path),
                other => Err(ConfigError::mismatch(path, "mapping", &other)),
            },
            FieldKind::Tagged(tagged) => match value {
                Value::Object(map) => self.merge_tagged(tagged, slot, map, path),
                other => Err(ConfigError::mismatch(path, "mapping", &other)),
            },
            kind => {
                let coerced = coerce(kind, &value, true)
                    .ok_or_else(|| ConfigError::mismatch(path, field.type_name(), &value))?;
                if !field.allows(&coerced) {
                    return Err(invalid_choice(field, path, &coerced));
                }
                *slot = coerced;
                Ok(())
            }
        }
    }

    fn merge_tagged(
        &self,
        tagged: &TaggedSchema,
        slot: &mut Value,
        mut overlay: Map<String, Value>,
        path: &str,
    ) -> Result<(), ConfigError> {
        let base_kind = slot
            .get(tagged.tag_key())
            .and_then(Value::as_str)
            .and_then(PolicyKind::from_tag)
            .unwrap_or(PolicyKind::Supervised);

        let resolution = variant::resolve(path, base_kind, self.variant_locked, &overlay)?;
        let tag = resolution.kind.tag();
        let record = tagged
            .variant(tag)
            .ok_or_else(|| SchemaError::UnknownVariant(tag.to_string()))?;

        if resolution.reset {
            *slot = tagged
                .default_value_for(tag)
                .ok_or_else(|| SchemaError::UnknownVariant(tag.to_string()))?;
        }

        overlay.remove(tagged.tag_key());
        self.merge_record(record, slot, overlay, path)
    }
}

fn invalid_choice(field: &FieldSpec, path: &str, value: &Value) -> ConfigError {
    let allowed = field
        .choices()
        .unwrap_or_default()
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    ConfigError::InvalidChoice {
        path: path.to_string(),
        value: value.to_string(),
        allowed,
    }
}

/// Convert `value` to `kind`, or `None` if it is not coercible.
///
/// Integers always widen to floats. With `lenient`, floats with no
/// fractional part also narrow to integers. Unions try every alternative
/// strictly before trying any leniently, so `1.0` for an integer-or-float
/// field stays a float.
fn coerce(kind: &FieldKind, value: &Value, lenient: bool) -> Option<Value> {
    match kind {
        FieldKind::Str => value.is_string().then(|| value.clone()),
        FieldKind::Bool => value.is_boolean().then(|| value.clone()),
        FieldKind::Int => coerce_int(value, lenient),
        FieldKind::Float => value.as_f64().map(Value::from),
        FieldKind::Nullable(inner) => match value {
            Value::Null => Some(Value::Null),
            other => coerce(inner, other, lenient),
        },
        FieldKind::List(inner) => coerce_items(inner, value.as_array()?, lenient),
        FieldKind::ScalarOrList(inner) => match value {
            Value::Array(items) => coerce_items(inner, items, lenient),
            scalar => coerce(inner, scalar, lenient),
        },
        FieldKind::Tuple(kinds) => {
            let items = value.as_array()?;
            if items.len() != kinds.len() {
                return None;
            }
            kinds
                .iter()
                .zip(items)
                .map(|(kind, item)| coerce(kind, item, lenient))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
        }
        FieldKind::Union(alternatives) => alternatives
            .iter()
            .find_map(|alt| coerce(alt, value, false))
            .or_else(|| {
                if lenient {
                    alternatives.iter().find_map(|alt| coerce(alt, value, true))
                } else {
                    None
                }
            }),
        FieldKind::Record(_) | FieldKind::Tagged(_) => None,
    }
}

fn coerce_items(kind: &FieldKind, items: &[Value], lenient: bool) -> Option<Value> {
    items
        .iter()
        .map(|item| coerce(kind, item, lenient))
        .collect::<Option<Vec<_>>>()
        .map(Value::Array)
}

fn coerce_int(value: &Value, lenient: bool) -> Option<Value> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(i) = number.as_i64() {
        return Some(Value::from(i));
    }
    if number.is_u64() {
        // Larger than i64::MAX.
        return None;
    }
    let f = number.as_f64()?;
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    if lenient && f.fract() == 0.0 && in_range {
        Some(Value::from(f as i64))
    } else {
        None
    }
}
