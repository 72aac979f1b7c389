//! Schema table for the configuration tree.
//!
//! This is the single source of defaults, help text, choice sets and UI
//! visibility. The typed tree in [`crate::config`] mirrors it field for
//! field.
//!
//! Fields whose allowed values are enforced by a named validation rule
//! (`ckpt.save_mode`, `ckpt.upload_s3`, `dp_replicate_size`) carry no
//! choice set here, so that the rule reports them.

use serde_json::json;
use trainconf_schema::{
    FieldKind, FieldSpec, RecordSchema, SchemaError, TaggedSchema, VariantSchema,
};

use crate::config::PolicyKind;

/// Key under which the training policy stores its variant tag.
pub const POLICY_TAG_KEY: &str = "type";

fn int_list() -> FieldKind {
    FieldKind::list(FieldKind::Int)
}

fn flag_or_name() -> FieldKind {
    FieldKind::Union(vec![FieldKind::Bool, FieldKind::Str])
}

/// Dataset and dataloader fields shared by both policy variants.
fn dataset_fields() -> Result<Vec<FieldSpec>, SchemaError> {
    Ok(vec![
        FieldSpec::builder("dataset_name", FieldKind::Str)
            .default("")
            .help("Huggingface dataset name or local path to parquet file")
            .build()?,
        FieldSpec::builder("dataset_subset", FieldKind::nullable(FieldKind::Str))
            .default("")
            .help("Dataset subset if exists")
            .build()?,
        FieldSpec::builder("dataset_revision", FieldKind::nullable(FieldKind::Str))
            .default("")
            .help("Dataset git revision: a branch name, a tag, or a commit hash")
            .build()?,
        FieldSpec::builder("dataset_train_split", FieldKind::scalar_or_list(FieldKind::Str))
            .default_factory(|| json!([]))
            .help("Dataset splits to train on")
            .build()?,
        FieldSpec::builder("enable_dataset_preprocess", FieldKind::Bool)
            .default(false)
            .help("Enable dataset preprocessing, such as image/video preprocessing")
            .build()?,
        FieldSpec::builder("enable_dataset_cache", FieldKind::Bool)
            .default(false)
            .help("Cache dataset processing results")
            .build()?,
        FieldSpec::builder("dataloader_num_workers", FieldKind::Int)
            .default(0)
            .help("Number of subprocesses used for data loading")
            .build()?,
        FieldSpec::builder("dataloader_prefetch_factor", FieldKind::nullable(FieldKind::Int))
            .default(json!(null))
            .help("Number of batches loaded in advance by each worker")
            .build()?,
    ])
}

/// Prompt and vision-asset fields shared by both policy variants.
fn prompt_fields() -> Result<Vec<FieldSpec>, SchemaError> {
    Ok(vec![
        FieldSpec::builder("system_prompt", FieldKind::Str)
            .default("")
            .help("System prompt prepended to every prompt")
            .build()?,
        FieldSpec::builder("max_pixels", FieldKind::Int)
            .default(320 * 256)
            .help("Maximum number of pixels per image or video frame")
            .build()?,
        FieldSpec::builder("fps", FieldKind::Int)
            .default(2)
            .help("Video frames per second, 0 disables downsampling")
            .build()?,
        FieldSpec::builder("vision_asset_column_name", FieldKind::Str)
            .default("")
            .help("Column naming the image or video asset files")
            .build()?,
    ])
}

pub fn supervised_schema() -> Result<RecordSchema, SchemaError> {
    let mut fields = dataset_fields()?;
    fields.extend([
        FieldSpec::builder("dataset_test_split", FieldKind::Str)
            .default("test")
            .help("Dataset split to test")
            .build()?,
        FieldSpec::builder(
            "dataset_test_size",
            FieldKind::Union(vec![FieldKind::Int, FieldKind::Float]),
        )
        .default(0.1)
        .help("Test set size: a ratio in (0, 1) of the dataset, or an absolute count")
        .build()?,
        FieldSpec::builder("enable_validation", FieldKind::Bool)
            .default(false)
            .help("Enable validation during training")
            .build()?,
        FieldSpec::builder("validation_freq", FieldKind::Int)
            .default(20)
            .help("Validation frequency in training steps")
            .build()?,
        FieldSpec::builder("validation_batch_per_replica", FieldKind::Int)
            .default(24)
            .help("Validation batch size per iteration in one replica")
            .build()?,
        FieldSpec::builder("conversation_column_name", FieldKind::Str)
            .default("conversations")
            .help("Column holding the formatted conversation json")
            .build()?,
    ]);
    fields.extend(prompt_fields()?);
    RecordSchema::new("sft", fields)
}

pub fn overlong_reward_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "overlong_reward",
        vec![
            FieldSpec::builder("enable_overlong_penalty", FieldKind::Bool)
                .default(false)
                .help("Penalize responses that are too long")
                .build()?,
            FieldSpec::builder("buffer_length", FieldKind::Int)
                .default(4096)
                .help("Response length beyond which the penalty applies")
                .build()?,
            FieldSpec::builder("penalty_factor", FieldKind::Float)
                .default(1.0)
                .help("Penalty grows linearly from 0 to this factor past the buffer length")
                .build()?,
        ],
    )
}

pub fn reinforcement_schema() -> Result<RecordSchema, SchemaError> {
    let mut fields = vec![FieldSpec::builder("variant", FieldKind::Str)
        .default("grpo")
        .choices(["grpo", "dapo"])
        .help("Policy optimization variant")
        .build()?];
    fields.extend(dataset_fields()?);
    fields.extend([
        FieldSpec::builder("prompt_column_name", FieldKind::Str)
            .default("")
            .help("Column name for the prompt")
            .build()?,
        FieldSpec::builder("choices_column_name", FieldKind::Str)
            .default("")
            .help("Column holding a list or mapping of choices, if any")
            .build()?,
        FieldSpec::builder("response_column_name", FieldKind::Str)
            .default("")
            .help("Column name for the reference answer")
            .build()?,
    ]);
    fields.extend(prompt_fields()?);
    fields.extend([
        FieldSpec::builder("reward_function", FieldKind::scalar_or_list(FieldKind::Str))
            .default_factory(|| json!([]))
            .help("Reward functions, e.g. `single_choice`, `boxed_math`, `format`")
            .build()?,
        FieldSpec::builder("temperature", FieldKind::Float)
            .default(0.9)
            .help("Sampling temperature; higher is more random")
            .build()?,
        FieldSpec::builder("epsilon_low", FieldKind::Float)
            .default(0.2)
            .help("Lower clipping epsilon")
            .build()?,
        FieldSpec::builder("epsilon_high", FieldKind::Float)
            .default(0.2)
            .help("Upper clipping epsilon")
            .build()?,
        FieldSpec::record("overlong_reward", overlong_reward_schema()?)
            .help("Overlong response penalty")
            .build()?,
        FieldSpec::builder("kl_beta", FieldKind::Float)
            .default(0.0)
            .help("KL coefficient; 0 skips loading the reference model")
            .build()?,
        FieldSpec::builder("mu_iterations", FieldKind::Int)
            .default(1)
            .help("Optimization iterations per batch")
            .build()?,
        FieldSpec::builder("mini_batch", FieldKind::Int)
            .default(2)
            .help("Mini-batch size")
            .build()?,
        FieldSpec::builder("allowed_outdated_steps", FieldKind::Int)
            .default(10)
            .help("Steps of rollout backlog tolerated before rollout traffic is throttled")
            .build()?,
    ]);
    RecordSchema::new("grpo", fields)
}

/// The supervised / reinforcement union, defaulting to supervised.
pub fn training_policy_schema() -> Result<TaggedSchema, SchemaError> {
    TaggedSchema::new(
        POLICY_TAG_KEY,
        PolicyKind::Supervised.tag(),
        vec![
            VariantSchema::new(PolicyKind::Supervised.tag(), supervised_schema()?),
            VariantSchema::new(PolicyKind::Reinforcement.tag(), reinforcement_schema()?),
        ],
    )
}

pub fn checkpoint_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "ckpt",
        vec![
            FieldSpec::builder("enable_checkpoint", FieldKind::Bool)
                .default(false)
                .help("Save checkpoints during training")
                .build()?,
            FieldSpec::builder("save_freq", FieldKind::Int)
                .default(20)
                .help("Checkpoint save frequency in training steps")
                .build()?,
            FieldSpec::builder("save_mode", FieldKind::Str)
                .default("async")
                .help("Checkpoint save mode: `async` or `sync`")
                .build()?,
            FieldSpec::builder("max_keep", FieldKind::Int)
                .default(5)
                .help("Maximum number of checkpoints kept, -1 keeps all")
                .build()?,
            FieldSpec::builder("export_safetensors", FieldKind::Bool)
                .default(true)
                .help("Export safetensors weights with their config files")
                .build()?,
            FieldSpec::builder("upload_hf", FieldKind::Bool)
                .default(false)
                .help("Upload safetensors weights to the model hub")
                .build()?,
            FieldSpec::builder("hf_repo_name", FieldKind::Str)
                .default("policy-checkpoints")
                .help("Model hub repository receiving uploaded weights")
                .build()?,
            FieldSpec::builder("upload_s3", flag_or_name())
                .default(false)
                .help("Upload checkpoints to S3: false, `final` or `all`")
                .build()?,
            FieldSpec::builder("s3_bucket", FieldKind::Str)
                .default("training-checkpoints")
                .help("S3 bucket receiving checkpoints")
                .build()?,
            FieldSpec::builder("s3_prefix", FieldKind::Str)
                .default("outputs")
                .help("S3 key prefix for uploaded checkpoints")
                .build()?,
        ],
    )
}

pub fn training_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "train",
        vec![
            FieldSpec::tagged("train_policy", training_policy_schema()?)
                .alias("policy")
                .build()?,
            FieldSpec::record("ckpt", checkpoint_schema()?)
                .alias("checkpoint")
                .build()?,
            FieldSpec::builder("resume", flag_or_name())
                .default(false)
                .help("Resume from the latest checkpoint in `output_dir` (true) or from a given path")
                .build()?,
            FieldSpec::builder("epoch", FieldKind::Int)
                .default(1)
                .help("Number of training epochs")
                .build()?,
            FieldSpec::builder("output_dir", FieldKind::Str)
                .default("./outputs")
                .help("Output directory")
                .build()?,
            FieldSpec::builder("timestamp", FieldKind::Str)
                .default("")
                .skip_ui()
                .help("Run timestamp used for the output directory; generated when empty")
                .build()?,
            FieldSpec::builder("epsilon", FieldKind::Float)
                .default(1e-6)
                .help("Optimizer epsilon")
                .build()?,
            FieldSpec::builder("optm_name", FieldKind::Str)
                .default("AdamW")
                .choices(["AdamW", "Adam"])
                .help("Optimizer name")
                .build()?,
            FieldSpec::builder("optm_lr", FieldKind::Float)
                .default(1e-6)
                .help("Learning rate")
                .build()?,
            FieldSpec::builder("optm_impl", FieldKind::Str)
                .default("fused")
                .choices(["fused", "foreach", "for-loop"])
                .help("Optimizer kernel implementation")
                .build()?,
            FieldSpec::builder("optm_weight_decay", FieldKind::Float)
                .default(0.0)
                .help("Weight decay")
                .build()?,
            FieldSpec::builder(
                "optm_betas",
                FieldKind::Tuple(vec![FieldKind::Float, FieldKind::Float]),
            )
            .default(json!([0.9, 0.999]))
            .help("Optimizer betas")
            .build()?,
            FieldSpec::builder("optm_warmup_steps", FieldKind::Int)
                .default(20)
                .help("Learning-rate warmup steps")
                .build()?,
            FieldSpec::builder("optm_grad_norm_clip", FieldKind::Float)
                .default(1.0)
                .help("Gradient norm clip")
                .build()?,
            FieldSpec::builder("async_tp_enabled", FieldKind::Bool)
                .default(false)
                .help("Use asynchronous tensor parallelism; requires `compile`")
                .build()?,
            FieldSpec::builder("compile", FieldKind::Bool)
                .default(true)
                .help("Compile the model graph")
                .build()?,
            FieldSpec::builder("param_dtype", FieldKind::Str)
                .default("bfloat16")
                .choices(["bfloat16", "float16", "float32"])
                .help("Data type for parameters and activations")
                .build()?,
            FieldSpec::builder("fsdp_reduce_dtype", FieldKind::Str)
                .default("float32")
                .choices(["float32"])
                .help("Data type for sharded gradient reduction")
                .build()?,
            FieldSpec::builder("fsdp_offload", FieldKind::Bool)
                .default(false)
                .help("Offload sharded parameters to CPU")
                .build()?,
            FieldSpec::builder("fsdp_reshard_after_forward", FieldKind::Str)
                .default("default")
                .choices(["always", "never", "default"])
                .help("Reshard parameters after the forward pass")
                .build()?,
            FieldSpec::builder("train_batch_per_replica", FieldKind::Int)
                .default(8)
                .help("Local batch size per gradient accumulation step in one replica")
                .build()?,
            FieldSpec::builder("sync_weight_interval", FieldKind::Int)
                .default(1)
                .help("Training steps between weight synchronizations across replicas")
                .build()?,
        ],
    )
}

pub fn parallelism_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "parallelism",
        vec![
            FieldSpec::builder("n_init_replicas", FieldKind::Int)
                .default(1)
                .help("Number of replicas created at startup")
                .build()?,
            FieldSpec::builder("tp_size", FieldKind::Int)
                .default(2)
                .help("Tensor parallelism size")
                .build()?,
            FieldSpec::builder("cp_size", FieldKind::Int)
                .default(1)
                .help("Context parallelism size")
                .build()?,
            FieldSpec::builder("dp_shard_size", FieldKind::Int)
                .default(-1)
                .help("Sharded data parallelism size, -1 to infer from the world size")
                .build()?,
            FieldSpec::builder("pp_size", FieldKind::Int)
                .default(1)
                .help("Pipeline parallelism size")
                .build()?,
            FieldSpec::builder("pp_micro_batch_size", FieldKind::Int)
                .default(1)
                .help("Pipeline micro-batch size; batch / micro-batch must divide by pp_size")
                .build()?,
            FieldSpec::builder("dp_replicate_size", FieldKind::Int)
                .default(1)
                .skip_ui()
                .help("Replicated data parallelism size; only 1 is supported")
                .build()?,
            FieldSpec::builder("cp_rotate_method", FieldKind::Str)
                .default("allgather")
                .choices(["allgather", "alltoall"])
                .help("How kv shards rotate under context parallelism")
                .build()?,
        ],
    )
}

/// Rollout view of the parallelism record: only tensor/pipeline degrees
/// and the replica count are user-facing.
pub fn rollout_parallelism_schema() -> Result<RecordSchema, SchemaError> {
    Ok(parallelism_schema()?.with_hidden(&[
        "dp_replicate_size",
        "cp_size",
        "dp_shard_size",
        "cp_rotate_method",
    ]))
}

pub fn policy_model_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "policy",
        vec![
            FieldSpec::record("parallelism", parallelism_schema()?).build()?,
            FieldSpec::builder("model_name_or_path", FieldKind::Str)
                .default("Qwen/Qwen2.5-VL-7B-Instruct")
                .help("Model hub name or local path")
                .build()?,
            FieldSpec::builder("model_max_length", FieldKind::Int)
                .default(4096)
                .help("Maximum training sequence length; longer samples are skipped")
                .build()?,
            FieldSpec::builder("model_gradient_checkpointing", FieldKind::Bool)
                .default(true)
                .help("Use gradient checkpointing")
                .build()?,
        ],
    )
}

pub fn sampling_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "sampling_config",
        vec![
            FieldSpec::builder("temperature", FieldKind::Float)
                .default(0.9)
                .help("Sampling temperature")
                .build()?,
            FieldSpec::builder("top_p", FieldKind::Float)
                .default(1.0)
                .help("Top-p for sampling")
                .build()?,
            FieldSpec::builder("top_k", FieldKind::Int)
                .default(10)
                .help("Top-k for sampling")
                .build()?,
            FieldSpec::builder("repetition_penalty", FieldKind::Float)
                .default(1.0)
                .help("Repetition penalty for sampling")
                .build()?,
        ],
    )
}

pub fn rollout_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "rollout",
        vec![
            FieldSpec::record("parallelism", rollout_parallelism_schema()?).build()?,
            FieldSpec::builder("gpu_memory_utilization", FieldKind::Float)
                .default(0.8)
                .help("GPU memory fraction reserved by the rollout backend")
                .build()?,
            FieldSpec::builder("enable_chunked_prefill", FieldKind::Bool)
                .default(false)
                .help("Enable chunked prefill")
                .build()?,
            FieldSpec::builder("max_response_length", FieldKind::Int)
                .default(2048)
                .help("Maximum generated length")
                .build()?,
            FieldSpec::builder("n_generation", FieldKind::Int)
                .default(16)
                .help("Completions generated per prompt")
                .build()?,
            FieldSpec::builder("batch_size", FieldKind::Int)
                .default(1)
                .skip_ui()
                .help("Rollout batch size")
                .build()?,
            FieldSpec::builder("quantization", FieldKind::Str)
                .default("none")
                .choices(["none"])
                .skip_ui()
                .help("Quantization used for rollout generation")
                .build()?,
            FieldSpec::builder("seed", FieldKind::Int)
                .default(42)
                .help("Random seed for rollout")
                .build()?,
            FieldSpec::record("sampling_config", sampling_schema()?).build()?,
        ],
    )
}

pub fn logging_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "logging",
        vec![
            FieldSpec::builder("enable_logging", FieldKind::Bool)
                .default(false)
                .help("Report training metrics to the experiment tracker")
                .build()?,
            FieldSpec::builder("project_name", FieldKind::Str)
                .default("policy_training")
                .help("Experiment tracker project name")
                .build()?,
            FieldSpec::builder("experiment_name", FieldKind::nullable(FieldKind::Str))
                .default(json!(null))
                .help("Display name for the run; defaults to the output directory")
                .build()?,
            FieldSpec::builder("report_mfu", FieldKind::Bool)
                .default(false)
                .help("Report model FLOPs utilization")
                .build()?,
        ],
    )
}

pub fn profiler_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "profiler",
        vec![
            FieldSpec::builder("enable_profiler", FieldKind::Bool)
                .default(false)
                .help("Enable the training profiler")
                .build()?,
            FieldSpec::builder("active_steps", FieldKind::Int)
                .default(1)
                .help("Number of steps traced")
                .build()?,
            FieldSpec::builder("rank_filter", int_list())
                .default_factory(|| json!([]))
                .help("Ranks traced by the profiler")
                .build()?,
        ],
    )
}

/// The full configuration schema.
pub fn config_schema() -> Result<RecordSchema, SchemaError> {
    RecordSchema::new(
        "config",
        vec![
            FieldSpec::record("train", training_schema()?)
                .alias("training")
                .build()?,
            FieldSpec::record("rollout", rollout_schema()?).build()?,
            FieldSpec::record("policy", policy_model_schema()?).build()?,
            FieldSpec::record("logging", logging_schema()?).build()?,
            FieldSpec::record("profiler", profiler_schema()?)
                .alias("profiling")
                .build()?,
            FieldSpec::builder("redis", FieldKind::Str)
                .default("")
                .skip_ui()
                .help("Redis server port")
                .build()?,
            FieldSpec::builder("eth_ips", FieldKind::Str)
                .default("")
                .skip_ui()
                .help("Ethernet addresses, `ip1;ip2;ip3`")
                .build()?,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigTree;

    #[test]
    fn test_schema_builds() {
        let schema = config_schema().unwrap();
        assert_eq!(schema.fields().len(), 7);
        assert!(schema.field("training").is_some());
        assert!(schema.field("profiling").is_some());
    }

    #[test]
    fn test_defaults_decode_into_tree() {
        let value = config_schema().unwrap().default_value();
        let tree: ConfigTree = serde_json::from_value(value).unwrap();

        assert_eq!(tree.policy_kind(), PolicyKind::Supervised);
        assert_eq!(tree.policy.parallelism.tp_size, 2);
        assert_eq!(tree.rollout.parallelism.dp_shard_size, -1);
        assert_eq!(tree.train.optm_betas, (0.9, 0.999));
        assert_eq!(tree.train.ckpt.save_mode, "async");
        assert!(tree.logging.experiment_name.is_none());
    }

    #[test]
    fn test_reinforcement_defaults_decode() {
        let tagged = training_policy_schema().unwrap();
        let value = tagged.default_value_for("grpo").unwrap();
        let policy: crate::config::TrainingPolicy = serde_json::from_value(value).unwrap();

        let rl = policy.as_reinforcement().unwrap();
        assert_eq!(rl.temperature, 0.9);
        assert_eq!(rl.overlong_reward.buffer_length, 4096);
        assert!(rl.reward_function.is_empty());
    }

    #[test]
    fn test_rollout_parallelism_is_restricted_view() {
        let rollout = rollout_parallelism_schema().unwrap();
        let visible: Vec<&str> = rollout.visible_fields().map(|f| f.name()).collect();
        assert_eq!(
            visible,
            vec!["n_init_replicas", "tp_size", "pp_size", "pp_micro_batch_size"]
        );
        // Same fields and defaults as the policy copy.
        assert_eq!(
            rollout.default_value(),
            parallelism_schema().unwrap().default_value()
        );
    }

    #[test]
    fn test_describe_hides_skip_ui_fields() {
        let schema = config_schema().unwrap();
        let visible = schema.describe(false);
        assert!(visible.iter().all(|d| !d.skip_ui));
        assert!(!visible.iter().any(|d| d.path == "train.timestamp"));
        assert!(!visible.iter().any(|d| d.path == "redis"));

        let all = schema.describe(true);
        assert!(all.iter().any(|d| d.path == "train.timestamp" && d.skip_ui));
        assert!(all
            .iter()
            .any(|d| d.path == "train.train_policy.kl_beta" && d.variant == Some("grpo")));
    }
}
