//! Property tests for parallelism validation

use proptest::prelude::*;
use trainconf::config::ParallelismConfig;
use trainconf::validate::validate_parallelism;
use trainconf::ValidationError;

fn parallelism(tp: i64, cp: i64, pp: i64, dp_shard: i64, dp_replicate: i64) -> ParallelismConfig {
    ParallelismConfig {
        n_init_replicas: 1,
        tp_size: tp,
        cp_size: cp,
        dp_shard_size: dp_shard,
        pp_size: pp,
        pp_micro_batch_size: 1,
        dp_replicate_size: dp_replicate,
        cp_rotate_method: "allgather".to_string(),
    }
}

fn shard_degree() -> impl Strategy<Value = i64> {
    prop_oneof![Just(-1i64), 1i64..64]
}

proptest! {
    #[test]
    fn prop_valid_degrees_pass(
        tp in 1i64..16,
        cp in 1i64..16,
        pp in 1i64..16,
        dp_shard in shard_degree(),
        micro_batches_per_stage in 1i64..8,
    ) {
        let config = parallelism(tp, cp, pp, dp_shard, 1);
        let batch = pp * micro_batches_per_stage;
        prop_assert!(validate_parallelism(&config, batch).is_ok());
    }

    #[test]
    fn prop_replication_always_rejected(
        tp in 1i64..16,
        cp in 1i64..16,
        pp in 1i64..16,
        dp_shard in shard_degree(),
    ) {
        let config = parallelism(tp, cp, pp, dp_shard, 2);
        let is_replication_error = matches!(
            validate_parallelism(&config, pp * 8),
            Err(ValidationError::UnsupportedReplication { value: 2, .. })
        );
        prop_assert!(is_replication_error);
    }

    #[test]
    fn prop_non_positive_tensor_degree_rejected(tp in -8i64..1) {
        let config = parallelism(tp, 1, 1, -1, 1);
        let is_degree_error = matches!(
            validate_parallelism(&config, 8),
            Err(ValidationError::NonPositiveDegree { .. })
        );
        prop_assert!(is_degree_error);
    }

    #[test]
    fn prop_micro_batch_divisibility(batch in 1i64..256, micro in 1i64..32) {
        let mut config = parallelism(1, 1, 2, -1, 1);
        config.pp_micro_batch_size = micro;
        let result = validate_parallelism(&config, batch);
        let expected_ok = batch % micro == 0 && (batch / micro) % 2 == 0;
        prop_assert_eq!(result.is_ok(), expected_ok);
    }
}
