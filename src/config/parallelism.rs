//! Parallelism decomposition.

use serde::{Deserialize, Serialize};

use crate::env::{self, Environment};
use crate::error::ConfigError;

/// Sentinel for a data-parallel shard degree inferred from the world size.
pub const AUTO_SHARD: i64 = -1;

/// Tensor / context / pipeline / data-parallel degrees.
///
/// The same shape is used for the trained policy and for the rollout engine;
/// the rollout copy only differs in which fields generated UIs expose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelismConfig {
    pub n_init_replicas: i64,
    pub tp_size: i64,
    pub cp_size: i64,
    pub dp_shard_size: i64,
    pub pp_size: i64,
    pub pp_micro_batch_size: i64,
    pub dp_replicate_size: i64,
    pub cp_rotate_method: String,
}

impl ParallelismConfig {
    /// Total worker count, read from `WORLD_SIZE` on every call.
    pub fn world_size(&self, env: &impl Environment) -> Result<i64, ConfigError> {
        env::read_count(env, env::WORLD_SIZE_VAR)
    }

    /// Workers on this node, read from `LOCAL_WORLD_SIZE` on every call.
    pub fn local_world_size(&self, env: &impl Environment) -> Result<i64, ConfigError> {
        env::read_count(env, env::LOCAL_WORLD_SIZE_VAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::FixedEnvironment;

    fn parallelism() -> ParallelismConfig {
        ParallelismConfig {
            n_init_replicas: 1,
            tp_size: 2,
            cp_size: 1,
            dp_shard_size: AUTO_SHARD,
            pp_size: 2,
            pp_micro_batch_size: 1,
            dp_replicate_size: 1,
            cp_rotate_method: "allgather".to_string(),
        }
    }

    #[test]
    fn test_world_size_defaults_to_one() {
        let env = FixedEnvironment::new();
        assert_eq!(parallelism().world_size(&env).unwrap(), 1);
        assert_eq!(parallelism().local_world_size(&env).unwrap(), 1);
    }

    #[test]
    fn test_world_size_read_on_demand() {
        let p = parallelism();
        let mut env = FixedEnvironment::new().with_var("WORLD_SIZE", "16");
        assert_eq!(p.world_size(&env).unwrap(), 16);

        env.set_var("WORLD_SIZE", "32");
        assert_eq!(p.world_size(&env).unwrap(), 32);
    }
}
