//! Entry point tying the schema, merge and validation together.

use serde_json::Value;
use trainconf_schema::{FieldDescriptor, RecordSchema};

use crate::config::ConfigTree;
use crate::env::{self, Environment, ProcessEnvironment};
use crate::error::ConfigError;
use crate::merge;
use crate::schema;
use crate::validate;

/// Resolves override mappings into validated configuration trees.
///
/// One resolver holds one copy of the schema table and the environment used
/// for worker counts and the run clock.
#[derive(Debug, Clone)]
pub struct Resolver<E: Environment = ProcessEnvironment> {
    schema: RecordSchema,
    env: E,
}

impl Resolver<ProcessEnvironment> {
    /// Resolver reading the real process environment.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_environment(ProcessEnvironment)
    }
}

impl<E: Environment> Resolver<E> {
    pub fn with_environment(env: E) -> Result<Self, ConfigError> {
        Ok(Self {
            schema: schema::config_schema()?,
            env,
        })
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    /// A fresh default tree. Nothing is shared with trees returned earlier.
    pub fn defaults(&self) -> Result<ConfigTree, ConfigError> {
        ConfigTree::from_value(self.schema.default_value())
    }

    /// Overlay `overrides` onto `base`. The result is not validated.
    pub fn merge(&self, base: ConfigTree, overrides: Value) -> Result<ConfigTree, ConfigError> {
        merge::merge_overrides(&self.schema, base, overrides, &self.env)
    }

    pub fn validate(&self, tree: ConfigTree) -> Result<ConfigTree, ConfigError> {
        validate::validate(tree)
    }

    /// Defaults, overlaid with `overrides`, validated.
    pub fn resolve(&self, overrides: Value) -> Result<ConfigTree, ConfigError> {
        let tree = self.merge(self.defaults()?, overrides)?;
        let tree = self.validate(tree)?;
        tracing::info!(
            variant = %tree.policy_kind(),
            output_dir = %tree.train.output_dir,
            "Configuration resolved"
        );
        Ok(tree)
    }

    /// Total number of workers, from `WORLD_SIZE` (default 1).
    pub fn world_size(&self) -> Result<i64, ConfigError> {
        env::read_count(&self.env, env::WORLD_SIZE_VAR)
    }

    /// Workers on this node, from `LOCAL_WORLD_SIZE` (default 1).
    pub fn local_world_size(&self) -> Result<i64, ConfigError> {
        env::read_count(&self.env, env::LOCAL_WORLD_SIZE_VAR)
    }

    /// Field listing for display surfaces.
    pub fn describe(&self, include_hidden: bool) -> Vec<FieldDescriptor> {
        self.schema.describe(include_hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyKind;
    use crate::env::FixedEnvironment;
    use chrono::NaiveDate;
    use serde_json::json;

    fn resolver() -> Resolver<FixedEnvironment> {
        let now = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap();
        Resolver::with_environment(FixedEnvironment::new().with_now(now)).unwrap()
    }

    #[test]
    fn test_defaults_are_fresh() {
        let resolver = resolver();
        let mut first = resolver.defaults().unwrap();
        first.profiler.rank_filter.push(7);
        let second = resolver.defaults().unwrap();
        assert!(second.profiler.rank_filter.is_empty());
        assert!(!second.variant_locked());
    }

    #[test]
    fn test_resolve_empty_overrides() {
        let tree = resolver().resolve(json!({})).unwrap();
        assert_eq!(tree.policy_kind(), PolicyKind::Supervised);
        assert_eq!(tree.train.timestamp, "20250601123005");
        assert!(tree.variant_locked());
    }

    #[test]
    fn test_resolve_runs_validation() {
        let err = resolver()
            .resolve(json!({"policy": {"model_name_or_path": ""}}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_worker_counts() {
        let resolver = resolver();
        assert_eq!(resolver.world_size().unwrap(), 1);

        let env = FixedEnvironment::new()
            .with_var(env::WORLD_SIZE_VAR, "16")
            .with_var(env::LOCAL_WORLD_SIZE_VAR, "8");
        let resolver = Resolver::with_environment(env).unwrap();
        assert_eq!(resolver.world_size().unwrap(), 16);
        assert_eq!(resolver.local_world_size().unwrap(), 8);
    }
}
