//! Field declarations.
//!
//! A [`FieldSpec`] couples a field name with its semantic type, exactly one
//! default source, and the presentation metadata (help text, choices,
//! UI visibility) that introspection collaborators read.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::SchemaError;
use crate::record::{RecordSchema, TaggedSchema};

/// Semantic type of a field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Str,
    Int,
    Float,
    Bool,
    /// `null` or the inner kind.
    Nullable(Box<FieldKind>),
    /// Homogeneous sequence.
    List(Box<FieldKind>),
    /// A bare scalar or a sequence of that scalar.
    ScalarOrList(Box<FieldKind>),
    /// Fixed-length heterogeneous sequence.
    Tuple(Vec<FieldKind>),
    /// Any one of the listed kinds, tried in order.
    Union(Vec<FieldKind>),
    /// Nested record, merged key by key.
    Record(RecordSchema),
    /// Tagged union of records.
    Tagged(TaggedSchema),
}

impl FieldKind {
    pub fn nullable(inner: FieldKind) -> Self {
        FieldKind::Nullable(Box::new(inner))
    }

    pub fn list(inner: FieldKind) -> Self {
        FieldKind::List(Box::new(inner))
    }

    pub fn scalar_or_list(inner: FieldKind) -> Self {
        FieldKind::ScalarOrList(Box::new(inner))
    }

    /// Human-readable type name used in error messages and descriptors.
    pub fn type_name(&self) -> String {
        match self {
            FieldKind::Str => "string".to_string(),
            FieldKind::Int => "integer".to_string(),
            FieldKind::Float => "float".to_string(),
            FieldKind::Bool => "boolean".to_string(),
            FieldKind::Nullable(inner) => format!("{} | null", inner.type_name()),
            FieldKind::List(inner) => format!("list<{}>", inner.type_name()),
            FieldKind::ScalarOrList(inner) => {
                let name = inner.type_name();
                format!("{} | list<{}>", name, name)
            }
            FieldKind::Tuple(items) => {
                let names: Vec<String> = items.iter().map(FieldKind::type_name).collect();
                format!("({})", names.join(", "))
            }
            FieldKind::Union(alternatives) => {
                let names: Vec<String> = alternatives.iter().map(FieldKind::type_name).collect();
                names.join(" | ")
            }
            FieldKind::Record(record) => format!("record<{}>", record.name()),
            FieldKind::Tagged(tagged) => {
                let tags: Vec<&str> = tagged.variants().iter().map(|v| v.tag()).collect();
                format!("tagged<{}>", tags.join(" | "))
            }
        }
    }

    /// True for nested records and tagged unions.
    pub fn is_composite(&self) -> bool {
        matches!(self, FieldKind::Record(_) | FieldKind::Tagged(_))
    }
}

/// Where a field's default comes from.
#[derive(Clone)]
pub enum DefaultSource {
    /// A static value, cloned on every use.
    Value(Value),
    /// A factory invoked on every use, so no two trees share an instance.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultSource {
    /// Produce a fresh default value.
    pub fn produce(&self) -> Value {
        match self {
            DefaultSource::Value(value) => value.clone(),
            DefaultSource::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for DefaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    aliases: Vec<&'static str>,
    kind: FieldKind,
    default: DefaultSource,
    help: Option<&'static str>,
    choices: Option<Vec<Value>>,
    skip_ui: bool,
}

impl FieldSpec {
    /// Start declaring a field.
    pub fn builder(name: &'static str, kind: FieldKind) -> FieldBuilder {
        FieldBuilder {
            name,
            kind,
            default: None,
            factory: None,
            help: None,
            choices: None,
            skip_ui: false,
            aliases: Vec::new(),
        }
    }

    /// Declare a nested record field. Its default is a factory that
    /// materializes the record's own defaults.
    pub fn record(name: &'static str, record: RecordSchema) -> FieldBuilder {
        let source = record.clone();
        Self::builder(name, FieldKind::Record(record))
            .default_factory(move || source.default_value())
    }

    /// Declare a tagged-union field defaulting to the union's default variant.
    pub fn tagged(name: &'static str, tagged: TaggedSchema) -> FieldBuilder {
        let source = tagged.clone();
        Self::builder(name, FieldKind::Tagged(tagged))
            .default_factory(move || source.default_value())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aliases(&self) -> &[&'static str] {
        &self.aliases
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn default_source(&self) -> &DefaultSource {
        &self.default
    }

    pub fn help(&self) -> Option<&'static str> {
        self.help
    }

    pub fn choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    /// Whether UI generators should hide this field. Has no effect on
    /// merging or validation.
    pub fn skip_ui(&self) -> bool {
        self.skip_ui
    }

    /// True if `key` is this field's name or one of its aliases.
    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }

    /// A fresh default value.
    pub fn default_value(&self) -> Value {
        self.default.produce()
    }

    /// True if the field declares no choice set or `value` is in it.
    pub fn allows(&self, value: &Value) -> bool {
        match &self.choices {
            Some(choices) => choices.iter().any(|c| c == value),
            None => true,
        }
    }

    /// Type name, including the choice set when one is declared.
    pub fn type_name(&self) -> String {
        match &self.choices {
            Some(choices) => {
                let names: Vec<String> = choices.iter().map(Value::to_string).collect();
                format!("choice<{}>", names.join(", "))
            }
            None => self.kind.type_name(),
        }
    }

    pub(crate) fn hide(&mut self) {
        self.skip_ui = true;
    }
}

/// Builder for [`FieldSpec`].
pub struct FieldBuilder {
    name: &'static str,
    kind: FieldKind,
    default: Option<Value>,
    factory: Option<Arc<dyn Fn() -> Value + Send + Sync>>,
    help: Option<&'static str>,
    choices: Option<Vec<Value>>,
    skip_ui: bool,
    aliases: Vec<&'static str>,
}

impl FieldBuilder {
    /// Static default value.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Default-producing factory, invoked once per tree construction.
    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// Restrict the field to an enumerated set of values.
    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Hide the field from generated UIs.
    pub fn skip_ui(mut self) -> Self {
        self.skip_ui = true;
        self
    }

    /// Accept an alternative key for this field in override input.
    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Finish the declaration. Exactly one default source must be set.
    pub fn build(self) -> Result<FieldSpec, SchemaError> {
        let default = match (self.default, self.factory) {
            (Some(value), None) => DefaultSource::Value(value),
            (None, Some(factory)) => DefaultSource::Factory(factory),
            (None, None) => return Err(SchemaError::MissingDefault(self.name.to_string())),
            (Some(_), Some(_)) => {
                return Err(SchemaError::ConflictingDefault(self.name.to_string()))
            }
        };

        Ok(FieldSpec {
            name: self.name,
            aliases: self.aliases,
            kind: self.kind,
            default,
            help: self.help,
            choices: self.choices,
            skip_ui: self.skip_ui,
        })
    }
}
