//! Record and tagged-union schemas.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::field::{FieldKind, FieldSpec};

/// An ordered set of field declarations.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    name: &'static str,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Build a record. Names and aliases must be unique within the record.
    pub fn new(name: &'static str, fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let mut seen: Vec<&'static str> = Vec::new();
        for field in &fields {
            for key in std::iter::once(field.name()).chain(field.aliases().iter().copied()) {
                if seen.contains(&key) {
                    return Err(SchemaError::DuplicateField {
                        record: name.to_string(),
                        name: key.to_string(),
                    });
                }
                seen.push(key);
            }
        }
        Ok(Self { name, fields })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field by name or alias.
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.answers_to(key))
    }

    /// Fields not flagged skip-UI.
    pub fn visible_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.skip_ui())
    }

    /// Materialize every default into a fresh object.
    pub fn default_value(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name().to_string(), f.default_value()))
            .collect();
        Value::Object(map)
    }

    /// Return a copy with the named fields flagged skip-UI. Used to derive a
    /// restricted view of a shared record.
    pub fn with_hidden(mut self, names: &[&str]) -> Self {
        for field in self.fields.iter_mut() {
            if names.contains(&field.name()) {
                field.hide();
            }
        }
        self
    }

    /// Flatten the schema into descriptors with dotted paths.
    ///
    /// Skip-UI fields (and everything beneath them) are omitted unless
    /// `include_hidden` is set.
    pub fn describe(&self, include_hidden: bool) -> Vec<FieldDescriptor> {
        let mut out = Vec::new();
        self.describe_into("", None, include_hidden, &mut out);
        out
    }

    fn describe_into(
        &self,
        prefix: &str,
        variant: Option<&'static str>,
        include_hidden: bool,
        out: &mut Vec<FieldDescriptor>,
    ) {
        for field in &self.fields {
            if field.skip_ui() && !include_hidden {
                continue;
            }
            let path = if prefix.is_empty() {
                field.name().to_string()
            } else {
                format!("{}.{}", prefix, field.name())
            };

            match field.kind() {
                FieldKind::Record(record) => {
                    record.describe_into(&path, variant, include_hidden, out);
                }
                FieldKind::Tagged(tagged) => {
                    for v in tagged.variants() {
                        v.record().describe_into(&path, Some(v.tag()), include_hidden, out);
                    }
                }
                _ => out.push(FieldDescriptor {
                    path,
                    variant,
                    type_name: field.type_name(),
                    default: field.default_value(),
                    help: field.help(),
                    choices: field.choices().map(<[Value]>::to_vec),
                    aliases: field.aliases().to_vec(),
                    skip_ui: field.skip_ui(),
                }),
            }
        }
    }
}

/// One variant of a tagged union.
#[derive(Debug, Clone)]
pub struct VariantSchema {
    tag: &'static str,
    record: RecordSchema,
}

impl VariantSchema {
    pub fn new(tag: &'static str, record: RecordSchema) -> Self {
        Self { tag, record }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn record(&self) -> &RecordSchema {
        &self.record
    }
}

/// A union of records told apart by a stored tag key.
#[derive(Debug, Clone)]
pub struct TaggedSchema {
    tag_key: &'static str,
    default_tag: &'static str,
    variants: Vec<VariantSchema>,
}

impl TaggedSchema {
    pub fn new(
        tag_key: &'static str,
        default_tag: &'static str,
        variants: Vec<VariantSchema>,
    ) -> Result<Self, SchemaError> {
        if !variants.iter().any(|v| v.tag == default_tag) {
            return Err(SchemaError::UnknownVariant(default_tag.to_string()));
        }
        Ok(Self {
            tag_key,
            default_tag,
            variants,
        })
    }

    pub fn tag_key(&self) -> &'static str {
        self.tag_key
    }

    pub fn default_tag(&self) -> &'static str {
        self.default_tag
    }

    pub fn variants(&self) -> &[VariantSchema] {
        &self.variants
    }

    pub fn variant(&self, tag: &str) -> Option<&RecordSchema> {
        self.variants.iter().find(|v| v.tag == tag).map(|v| &v.record)
    }

    /// Fresh defaults for `tag`, with the tag key stamped in.
    pub fn default_value_for(&self, tag: &str) -> Option<Value> {
        let record = self.variant(tag)?;
        let mut value = record.default_value();
        if let Value::Object(map) = &mut value {
            map.insert(self.tag_key.to_string(), Value::String(tag.to_string()));
        }
        Some(value)
    }

    /// Fresh defaults for the default variant.
    pub fn default_value(&self) -> Value {
        self.default_value_for(self.default_tag).unwrap_or(Value::Null)
    }
}

/// Flattened, serializable view of a leaf field for UI generators.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldDescriptor {
    pub path: String,

    /// Tag of the tagged-union variant this field belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<&'static str>,

    #[serde(rename = "type")]
    pub type_name: String,

    pub default: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<&'static str>,

    pub skip_ui: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overlong() -> RecordSchema {
        RecordSchema::new(
            "overlong",
            vec![
                FieldSpec::builder("enable", FieldKind::Bool)
                    .default(false)
                    .build()
                    .unwrap(),
                FieldSpec::builder("buffer_length", FieldKind::Int)
                    .default(4096)
                    .skip_ui()
                    .build()
                    .unwrap(),
            ],
        )
        .unwrap()
    }

    fn outer() -> RecordSchema {
        RecordSchema::new(
            "outer",
            vec![
                FieldSpec::builder("seed", FieldKind::Int)
                    .default(42)
                    .help("Random seed")
                    .build()
                    .unwrap(),
                FieldSpec::record("overlong", overlong())
                    .alias("overlong_reward")
                    .build()
                    .unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_default_value_materializes_nested_records() {
        let value = outer().default_value();
        assert_eq!(
            value,
            json!({"seed": 42, "overlong": {"enable": false, "buffer_length": 4096}})
        );
    }

    #[test]
    fn test_defaults_are_not_aliased() {
        let schema = outer();
        let mut first = schema.default_value();
        first["overlong"]["enable"] = json!(true);
        let second = schema.default_value();
        assert_eq!(second["overlong"]["enable"], json!(false));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let result = RecordSchema::new(
            "dup",
            vec![
                FieldSpec::builder("a", FieldKind::Int).default(1).build().unwrap(),
                FieldSpec::builder("b", FieldKind::Int)
                    .default(2)
                    .alias("a")
                    .build()
                    .unwrap(),
            ],
        );
        assert!(matches!(result, Err(SchemaError::DuplicateField { .. })));
    }

    #[test]
    fn test_lookup_by_alias() {
        let schema = outer();
        assert_eq!(schema.field("overlong_reward").unwrap().name(), "overlong");
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_describe_hides_skip_ui() {
        let schema = outer();
        let visible: Vec<String> = schema.describe(false).into_iter().map(|d| d.path).collect();
        assert_eq!(visible, vec!["seed", "overlong.enable"]);

        let all = schema.describe(true);
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|d| d.path == "overlong.buffer_length" && d.skip_ui));
    }

    #[test]
    fn test_with_hidden() {
        let schema = overlong().with_hidden(&["enable"]);
        assert_eq!(schema.visible_fields().count(), 0);
    }

    #[test]
    fn test_tagged_defaults_carry_tag() {
        let tagged = TaggedSchema::new(
            "type",
            "a",
            vec![
                VariantSchema::new("a", overlong()),
                VariantSchema::new("b", outer()),
            ],
        )
        .unwrap();

        assert_eq!(tagged.default_value()["type"], json!("a"));
        assert_eq!(tagged.default_value_for("b").unwrap()["seed"], json!(42));
        assert!(tagged.default_value_for("c").is_none());
    }

    #[test]
    fn test_tagged_unknown_default_rejected() {
        let result = TaggedSchema::new("type", "z", vec![VariantSchema::new("a", overlong())]);
        assert_eq!(result.unwrap_err(), SchemaError::UnknownVariant("z".to_string()));
    }
}
