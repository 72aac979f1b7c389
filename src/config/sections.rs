//! Model, rollout, logging and profiler sections.

use serde::{Deserialize, Serialize};

use super::parallelism::ParallelismConfig;

/// The trained policy model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub parallelism: ParallelismConfig,
    pub model_name_or_path: String,
    pub model_max_length: i64,
    pub model_gradient_checkpointing: bool,
}

/// Sampling parameters for rollout generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i64,
    pub repetition_penalty: f64,
}

/// Rollout engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    pub parallelism: ParallelismConfig,
    pub gpu_memory_utilization: f64,
    pub enable_chunked_prefill: bool,
    pub max_response_length: i64,
    pub n_generation: i64,
    pub batch_size: i64,
    pub quantization: String,
    pub seed: i64,
    pub sampling_config: SamplingConfig,
}

/// Experiment tracking switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub enable_logging: bool,
    pub project_name: String,
    /// Falls back to the output directory when unset.
    pub experiment_name: Option<String>,
    pub report_mfu: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    pub enable_profiler: bool,
    pub active_steps: i64,
    pub rank_filter: Vec<i64>,
}
