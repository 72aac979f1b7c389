//! Cross-field validation of a merged tree.
//!
//! [`validate`] runs once, right after the merge. It is fail-fast: the
//! first violated rule is reported. Besides checking, it normalizes the
//! scalar-or-list fields of the training policy to list form and clears
//! prefetching when no dataloader workers are configured.

use crate::config::{
    CheckpointConfig, ConfigTree, FlagOrName, ParallelismConfig, PolicyConfig, ScalarOrList,
    TrainingConfig, TrainingPolicy, AUTO_SHARD,
};
use crate::error::ConfigError;

const MODEL_PATH: &str = "policy.model_name_or_path";
const TP_PATH: &str = "policy.parallelism.tp_size";
const CP_PATH: &str = "policy.parallelism.cp_size";
const PP_PATH: &str = "policy.parallelism.pp_size";
const DP_SHARD_PATH: &str = "policy.parallelism.dp_shard_size";
const DP_REPLICATE_PATH: &str = "policy.parallelism.dp_replicate_size";
const MICRO_BATCH_PATH: &str = "policy.parallelism.pp_micro_batch_size";
const REWARD_PATH: &str = "train.train_policy.reward_function";
const UPLOAD_S3_PATH: &str = "train.ckpt.upload_s3";
const SAVE_FREQ_PATH: &str = "train.ckpt.save_freq";
const SAVE_MODE_PATH: &str = "train.ckpt.save_mode";
const ASYNC_TP_PATH: &str = "train.async_tp_enabled";
const COMPILE_PATH: &str = "train.compile";

/// Accepted values of a truthy `upload_s3`.
pub const UPLOAD_S3_MODES: [&str; 2] = ["final", "all"];

/// Accepted checkpoint save modes.
pub const SAVE_MODES: [&str; 2] = ["async", "sync"];

/// A violated validation rule. Each variant carries the dotted path of the
/// offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{path} is required")]
    MissingModel { path: String },

    #[error("{path} must be greater than 0, got {value}")]
    NonPositiveDegree { path: String, value: i64 },

    #[error("{path} must be greater than 0 or -1 to be auto-inferred, got {value}")]
    InvalidShardDegree { path: String, value: i64 },

    #[error("{path} must be 1, got {value}: replicated data parallelism cannot follow a replica count that changes at runtime")]
    UnsupportedReplication { path: String, value: i64 },

    #[error("{path} must be greater than 0 when pipeline parallelism is enabled, got {value}")]
    NonPositiveMicroBatch { path: String, value: i64 },

    #[error("train.train_batch_per_replica ({batch}) must be divisible by {path} ({micro_batch})")]
    BatchNotDivisible {
        path: String,
        batch: i64,
        micro_batch: i64,
    },

    #[error("micro-batch count {count} must be divisible by {path} ({pp_size})")]
    MicroBatchesNotDivisible {
        path: String,
        count: i64,
        pp_size: i64,
    },

    #[error("{path} must name at least one reward function")]
    NoRewardFunction { path: String },

    #[error("{path} must be greater than 0, got {value}")]
    NonPositiveSaveFreq { path: String, value: i64 },

    #[error("{path} must be one of ['async', 'sync'], got '{value}'")]
    InvalidSaveMode { path: String, value: String },
}

impl ValidationError {
    /// Dotted path of the offending field.
    pub fn path(&self) -> &str {
        match self {
            ValidationError::MissingModel { path }
            | ValidationError::NonPositiveDegree { path, .. }
            | ValidationError::InvalidShardDegree { path, .. }
            | ValidationError::UnsupportedReplication { path, .. }
            | ValidationError::NonPositiveMicroBatch { path, .. }
            | ValidationError::BatchNotDivisible { path, .. }
            | ValidationError::MicroBatchesNotDivisible { path, .. }
            | ValidationError::NoRewardFunction { path }
            | ValidationError::NonPositiveSaveFreq { path, .. }
            | ValidationError::InvalidSaveMode { path, .. } => path,
        }
    }
}

/// Validate a merged tree and return it normalized.
pub fn validate(mut tree: ConfigTree) -> Result<ConfigTree, ConfigError> {
    validate_model(&tree.policy)?;
    validate_parallelism(&tree.policy.parallelism, tree.train.train_batch_per_replica)?;
    normalize_policy(&mut tree.train.train_policy)?;
    validate_checkpoint(&tree.train.ckpt)?;
    validate_compile(&tree.train)?;

    tracing::debug!(
        variant = %tree.policy_kind(),
        model = %tree.policy.model_name_or_path,
        "Configuration validated"
    );
    Ok(tree)
}

fn validate_model(policy: &PolicyConfig) -> Result<(), ValidationError> {
    if policy.model_name_or_path.is_empty() {
        return Err(ValidationError::MissingModel {
            path: MODEL_PATH.to_string(),
        });
    }
    Ok(())
}

/// Degree and pipeline micro-batch checks.
///
/// The micro-batch count check assumes one pipeline stage per rank (GPipe,
/// 1F1B). Interleaved schedules place several stages per rank and may be
/// rejected here even when valid.
pub fn validate_parallelism(
    parallelism: &ParallelismConfig,
    train_batch_per_replica: i64,
) -> Result<(), ValidationError> {
    for (path, value) in [
        (TP_PATH, parallelism.tp_size),
        (CP_PATH, parallelism.cp_size),
        (PP_PATH, parallelism.pp_size),
    ] {
        if value < 1 {
            return Err(ValidationError::NonPositiveDegree {
                path: path.to_string(),
                value,
            });
        }
    }

    if parallelism.dp_shard_size != AUTO_SHARD && parallelism.dp_shard_size <= 0 {
        return Err(ValidationError::InvalidShardDegree {
            path: DP_SHARD_PATH.to_string(),
            value: parallelism.dp_shard_size,
        });
    }

    if parallelism.dp_replicate_size != 1 {
        return Err(ValidationError::UnsupportedReplication {
            path: DP_REPLICATE_PATH.to_string(),
            value: parallelism.dp_replicate_size,
        });
    }

    if parallelism.pp_size > 1 {
        let micro_batch = parallelism.pp_micro_batch_size;
        if micro_batch <= 0 {
            return Err(ValidationError::NonPositiveMicroBatch {
                path: MICRO_BATCH_PATH.to_string(),
                value: micro_batch,
            });
        }
        if train_batch_per_replica % micro_batch != 0 {
            return Err(ValidationError::BatchNotDivisible {
                path: MICRO_BATCH_PATH.to_string(),
                batch: train_batch_per_replica,
                micro_batch,
            });
        }
        let count = train_batch_per_replica / micro_batch;
        if count % parallelism.pp_size != 0 {
            return Err(ValidationError::MicroBatchesNotDivisible {
                path: PP_PATH.to_string(),
                count,
                pp_size: parallelism.pp_size,
            });
        }
    }

    Ok(())
}

fn normalize_policy(policy: &mut TrainingPolicy) -> Result<(), ValidationError> {
    if let TrainingPolicy::Reinforcement(rl) = policy {
        let rewards = std::mem::replace(&mut rl.reward_function, ScalarOrList::Many(Vec::new()));
        rl.reward_function = rewards.normalized();
        if rl.reward_function.is_empty() {
            return Err(ValidationError::NoRewardFunction {
                path: REWARD_PATH.to_string(),
            });
        }
    }
    policy.normalize_train_split();
    policy.normalize_dataloader();
    Ok(())
}

fn validate_checkpoint(ckpt: &CheckpointConfig) -> Result<(), ConfigError> {
    if ckpt.upload_s3.is_truthy() {
        let accepted = ckpt
            .upload_s3
            .as_name()
            .is_some_and(|mode| UPLOAD_S3_MODES.contains(&mode));
        if !accepted {
            let value = match &ckpt.upload_s3 {
                FlagOrName::Flag(flag) => flag.to_string(),
                FlagOrName::Name(name) => format!("\"{}\"", name),
            };
            return Err(ConfigError::InvalidChoice {
                path: UPLOAD_S3_PATH.to_string(),
                value,
                allowed: "false, \"final\", \"all\"".to_string(),
            });
        }
    }

    if ckpt.save_freq <= 0 {
        return Err(ValidationError::NonPositiveSaveFreq {
            path: SAVE_FREQ_PATH.to_string(),
            value: ckpt.save_freq,
        }
        .into());
    }

    if !SAVE_MODES.contains(&ckpt.save_mode.as_str()) {
        return Err(ValidationError::InvalidSaveMode {
            path: SAVE_MODE_PATH.to_string(),
            value: ckpt.save_mode.clone(),
        }
        .into());
    }

    Ok(())
}

fn validate_compile(train: &TrainingConfig) -> Result<(), ConfigError> {
    if train.async_tp_enabled && !train.compile {
        return Err(ConfigError::IncompatibleOptions {
            path: ASYNC_TP_PATH.to_string(),
            requires: COMPILE_PATH.to_string(),
            reason: "async tensor parallelism only runs under graph compilation".to_string(),
        });
    }
    Ok(())
}
