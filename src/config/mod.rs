//! The typed configuration tree.
//!
//! The tree holds runtime values only. Defaults, help text, choices and
//! visibility live in the schema table ([`crate::schema`]); a fresh default
//! tree is materialized from that table on every call to
//! [`Resolver::defaults`](crate::Resolver::defaults).

mod parallelism;
mod policy;
mod sections;
mod train;

pub use parallelism::{ParallelismConfig, AUTO_SHARD};
pub use policy::{
    OverlongRewardConfig, PolicyKind, ReinforcementPolicy, ScalarOrList, SupervisedPolicy,
    TestSplitSize, TrainingPolicy,
};
pub use sections::{LoggingConfig, PolicyConfig, ProfilerConfig, RolloutConfig, SamplingConfig};
pub use train::{CheckpointConfig, FlagOrName, Precision, TrainingConfig};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Root of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTree {
    pub train: TrainingConfig,
    pub rollout: RolloutConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
    pub profiler: ProfilerConfig,
    /// Redis server port.
    pub redis: String,
    /// Semicolon-separated ethernet addresses.
    pub eth_ips: String,
}

impl ConfigTree {
    pub(crate) fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, ConfigError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Whether the training-policy variant is fixed.
    ///
    /// Every merge stamps `train.timestamp`, so a stamped tree came out of a
    /// merge. The lock lives in the data and survives serialization.
    pub fn variant_locked(&self) -> bool {
        !self.train.timestamp.is_empty()
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.train.train_policy.kind()
    }

    /// Get a subtree by dotted path, e.g. `train.ckpt`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let root = self.to_value().ok()?;
        let mut current = &root;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            current = current.get(part)?;
        }
        Some(current.clone())
    }
}

/// Flat key/value dump of a section for telemetry collaborators.
///
/// Keys starting with `_` are private and never reported.
pub trait KeyValues: Serialize {
    fn key_values(&self) -> BTreeMap<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}

impl KeyValues for ConfigTree {}
impl KeyValues for TrainingConfig {}
impl KeyValues for PolicyConfig {}
impl KeyValues for ParallelismConfig {}
impl KeyValues for RolloutConfig {}
impl KeyValues for LoggingConfig {}
impl KeyValues for ProfilerConfig {}
