//! Override file and assignment layering tests
//!
//! Files and `key=value` assignments are stacked, then resolved.

use chrono::NaiveDate;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use trainconf::{ConfigError, FixedEnvironment, OverrideLayers, OverrideOrigin, PolicyKind, Resolver};

fn resolver() -> Resolver<FixedEnvironment> {
    let now = NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(9, 26, 53)
        .unwrap();
    Resolver::with_environment(FixedEnvironment::new().with_now(now)).unwrap()
}

const GRPO_TOML: &str = r#"
[train]
epoch = 2
output_dir = "./runs"

[train.train_policy]
dataset_name = "gsm8k"
kl_beta = 0.02
reward_function = ["boxed_math", "format"]

[policy.parallelism]
tp_size = 2
"#;

#[test]
fn test_toml_file_resolves_reinforcement() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grpo.toml");
    fs::write(&path, GRPO_TOML).unwrap();

    let mut layers = OverrideLayers::new();
    layers.push_file(&path).unwrap();
    let tree = resolver().resolve(layers.merged()).unwrap();

    assert_eq!(tree.policy_kind(), PolicyKind::Reinforcement);
    assert_eq!(tree.policy.parallelism.tp_size, 2);
    assert_eq!(tree.train.output_dir, "./runs/20250314092653");
    let rl = tree.train.train_policy.as_reinforcement().unwrap();
    assert_eq!(rl.kl_beta, 0.02);
    assert_eq!(rl.reward_function.as_slice().len(), 2);
}

#[test]
fn test_assignments_override_files() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.toml");
    let site = dir.path().join("site.json");
    fs::write(&base, GRPO_TOML).unwrap();
    fs::write(&site, r#"{"train": {"epoch": 4}, "logging": {"experiment_name": "site"}}"#).unwrap();

    let mut layers = OverrideLayers::new();
    layers.push_file(&base).unwrap();
    layers.push_file(&site).unwrap();
    layers
        .push_assignments(&["train.epoch=6", "policy.model_name_or_path=org/model-7b"])
        .unwrap();

    let tree = resolver().resolve(layers.merged()).unwrap();
    assert_eq!(tree.train.epoch, 6);
    assert_eq!(tree.logging.experiment_name.as_deref(), Some("site"));
    assert_eq!(tree.policy.model_name_or_path, "org/model-7b");

    let origins: Vec<_> = layers.sources().iter().map(|s| s.origin).collect();
    assert_eq!(
        origins,
        vec![OverrideOrigin::File, OverrideOrigin::File, OverrideOrigin::Cli]
    );
}

#[test]
fn test_source_digest_tracks_file_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.toml");

    fs::write(&path, "[train]\nepoch = 1\n").unwrap();
    let mut first = OverrideLayers::new();
    first.push_file(&path).unwrap();

    fs::write(&path, "[train]\nepoch = 2\n").unwrap();
    let mut second = OverrideLayers::new();
    second.push_file(&path).unwrap();

    assert_ne!(first.sources()[0].digest, second.sources()[0].digest);
    assert_eq!(
        serde_json::to_value(&first.sources()[0]).unwrap()["origin"],
        json!("file")
    );
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let mut layers = OverrideLayers::new();
    let err = layers.push_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert!(layers.is_empty());
}

#[test]
fn test_assignment_type_checked_at_resolve() {
    let mut layers = OverrideLayers::new();
    layers.push_assignments(&["train.compile=maybe"]).unwrap();

    let err = resolver().resolve(layers.merged()).unwrap_err();
    assert!(matches!(err, ConfigError::TypeMismatch { ref path, .. } if path == "train.compile"));
}
