//! Training section: optimizer, precision, checkpointing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::policy::TrainingPolicy;
use crate::error::ConfigError;

/// A field that is either a boolean switch or a named value
/// (`resume = true` vs `resume = "path/to/ckpt"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagOrName {
    Flag(bool),
    Name(String),
}

impl FlagOrName {
    /// `false` and the empty string are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FlagOrName::Flag(flag) => *flag,
            FlagOrName::Name(name) => !name.is_empty(),
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            FlagOrName::Name(name) => Some(name),
            FlagOrName::Flag(_) => None,
        }
    }
}

/// Checkpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub enable_checkpoint: bool,
    pub save_freq: i64,
    pub save_mode: String,
    pub max_keep: i64,
    pub export_safetensors: bool,
    pub upload_hf: bool,
    pub hf_repo_name: String,
    /// `false`, `"final"` or `"all"`.
    pub upload_s3: FlagOrName,
    pub s3_bucket: String,
    pub s3_prefix: String,
}

/// Numeric compute precision resolved from a dtype name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    BFloat16,
    Float16,
    Float32,
}

impl Precision {
    pub const ALL: [Precision; 3] = [Precision::BFloat16, Precision::Float16, Precision::Float32];

    pub fn name(self) -> &'static str {
        match self {
            Precision::BFloat16 => "bfloat16",
            Precision::Float16 => "float16",
            Precision::Float32 => "float32",
        }
    }

    fn resolve(path: &str, name: &str, allowed: &[Precision]) -> Result<Self, ConfigError> {
        allowed
            .iter()
            .copied()
            .find(|p| p.name() == name)
            .ok_or_else(|| ConfigError::InvalidChoice {
                path: path.to_string(),
                value: format!("\"{}\"", name),
                allowed: allowed
                    .iter()
                    .map(|p| format!("\"{}\"", p.name()))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl FromStr for Precision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve("dtype", s, &Self::ALL)
    }
}

/// Training section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub train_policy: TrainingPolicy,
    pub ckpt: CheckpointConfig,
    pub resume: FlagOrName,
    pub epoch: i64,
    pub output_dir: String,
    pub timestamp: String,
    pub epsilon: f64,
    pub optm_name: String,
    pub optm_lr: f64,
    pub optm_impl: String,
    pub optm_weight_decay: f64,
    pub optm_betas: (f64, f64),
    pub optm_warmup_steps: i64,
    pub optm_grad_norm_clip: f64,
    pub async_tp_enabled: bool,
    pub compile: bool,
    pub param_dtype: String,
    pub fsdp_reduce_dtype: String,
    pub fsdp_offload: bool,
    pub fsdp_reshard_after_forward: String,
    pub train_batch_per_replica: i64,
    pub sync_weight_interval: i64,
}

impl TrainingConfig {
    /// Precision for parameters and activations.
    pub fn param_precision(&self) -> Result<Precision, ConfigError> {
        Precision::resolve("train.param_dtype", &self.param_dtype, &Precision::ALL)
    }

    /// Precision for sharded-data-parallel gradient reduction.
    pub fn fsdp_reduce_precision(&self) -> Result<Precision, ConfigError> {
        Precision::resolve(
            "train.fsdp_reduce_dtype",
            &self.fsdp_reduce_dtype,
            &[Precision::Float32],
        )
    }
}
