//! Training-policy variant resolution.
//!
//! The merge engine cannot allocate the right policy shape without knowing
//! which variant the input describes, so the variant is chosen from the raw
//! override keys first. The key heuristic lives only here, at the input
//! boundary; after resolution the tag is stored in the tree and never
//! re-derived.

use serde_json::{Map, Value};

use crate::config::PolicyKind;
use crate::error::ConfigError;
use crate::schema::POLICY_TAG_KEY;

/// Keys whose presence under the training policy selects the
/// reinforcement variant.
///
/// This set is part of the input contract. Adding a reinforcement-only key
/// here changes how existing inputs resolve and must bump
/// [`DISCRIMINATOR_SET_VERSION`].
pub const DISCRIMINATOR_KEYS: [&str; 4] = ["temperature", "epsilon_low", "epsilon_high", "kl_beta"];

/// Version of [`DISCRIMINATOR_KEYS`].
pub const DISCRIMINATOR_SET_VERSION: u32 = 1;

/// Variant named by a policy override mapping. Anything without a
/// discriminator key, including an empty mapping, is supervised.
pub fn detect(policy_overrides: &Map<String, Value>) -> PolicyKind {
    if DISCRIMINATOR_KEYS
        .iter()
        .any(|key| policy_overrides.contains_key(*key))
    {
        PolicyKind::Reinforcement
    } else {
        PolicyKind::Supervised
    }
}

/// Outcome of resolving the variant against a base tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub kind: PolicyKind,
    /// The base policy must be replaced by fresh defaults of `kind` before
    /// the overrides are applied.
    pub reset: bool,
}

/// Resolve the variant for one merge.
///
/// `base` is the variant currently in the tree and `locked` tells whether
/// an earlier merge already fixed it. A locked variant is kept; asking a
/// locked supervised tree for reinforcement keys is a conflict. An explicit
/// tag key in the overrides must agree with the outcome.
pub fn resolve(
    path: &str,
    base: PolicyKind,
    locked: bool,
    overrides: &Map<String, Value>,
) -> Result<Resolution, ConfigError> {
    let detected = detect(overrides);

    let resolution = if locked {
        if detected == PolicyKind::Reinforcement && base == PolicyKind::Supervised {
            return Err(ConfigError::VariantConflict {
                path: path.to_string(),
                resolved: base.tag().to_string(),
                requested: detected.tag().to_string(),
            });
        }
        Resolution {
            kind: base,
            reset: false,
        }
    } else {
        Resolution {
            kind: detected,
            reset: detected != base,
        }
    };

    if let Some(tag) = overrides.get(POLICY_TAG_KEY) {
        let tag_path = format!("{}.{}", path, POLICY_TAG_KEY);
        let requested = tag
            .as_str()
            .ok_or_else(|| ConfigError::mismatch(&tag_path, "string", tag))?;
        if PolicyKind::from_tag(requested) != Some(resolution.kind) {
            return Err(ConfigError::VariantConflict {
                path: tag_path,
                resolved: resolution.kind.tag().to_string(),
                requested: requested.to_string(),
            });
        }
    }

    tracing::debug!(
        path,
        variant = %resolution.kind,
        reset = resolution.reset,
        locked,
        "Resolved training policy variant"
    );

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_each_discriminator_selects_reinforcement() {
        for key in DISCRIMINATOR_KEYS {
            let mut overrides = Map::new();
            overrides.insert(key.to_string(), json!(0.5));
            assert_eq!(detect(&overrides), PolicyKind::Reinforcement, "key {}", key);
        }
    }

    #[test]
    fn test_empty_and_shared_keys_default_to_supervised() {
        assert_eq!(detect(&Map::new()), PolicyKind::Supervised);
        assert_eq!(
            detect(&map(json!({"system_prompt": "be brief"}))),
            PolicyKind::Supervised
        );
        // reward_function is reinforcement-only but not a discriminator
        assert_eq!(
            detect(&map(json!({"reward_function": "format"}))),
            PolicyKind::Supervised
        );
    }

    #[test]
    fn test_unlocked_resolution_resets_on_change() {
        let overrides = map(json!({"kl_beta": 0.01}));
        let resolution = resolve("train.train_policy", PolicyKind::Supervised, false, &overrides).unwrap();
        assert_eq!(resolution.kind, PolicyKind::Reinforcement);
        assert!(resolution.reset);

        let same = resolve("train.train_policy", PolicyKind::Reinforcement, false, &overrides).unwrap();
        assert!(!same.reset);
    }

    #[test]
    fn test_locked_variant_is_kept() {
        let overrides = map(json!({"dataset_name": "foo"}));
        let resolution =
            resolve("train.train_policy", PolicyKind::Reinforcement, true, &overrides).unwrap();
        assert_eq!(resolution.kind, PolicyKind::Reinforcement);
        assert!(!resolution.reset);
    }

    #[test]
    fn test_locked_supervised_rejects_discriminators() {
        let overrides = map(json!({"temperature": 0.7}));
        let err = resolve("train.train_policy", PolicyKind::Supervised, true, &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::VariantConflict { .. }));
    }

    #[test]
    fn test_explicit_tag_must_agree() {
        let ok = map(json!({"type": "grpo", "temperature": 0.7}));
        assert!(resolve("p", PolicyKind::Supervised, false, &ok).is_ok());

        let conflicting = map(json!({"type": "grpo", "dataset_name": "foo"}));
        let err = resolve("p", PolicyKind::Supervised, false, &conflicting).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Training policy at 'p.type' is resolved as 'sft', cannot apply 'grpo'"
        );
    }
}
