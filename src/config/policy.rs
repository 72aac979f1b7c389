//! Training policy: the supervised / reinforcement tagged union.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value that may be given either as a bare scalar or as a list.
///
/// Validation normalizes every instance to [`ScalarOrList::Many`], so
/// consumers of a resolved tree always see the list form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrList<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> ScalarOrList<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            ScalarOrList::One(value) => std::slice::from_ref(value),
            ScalarOrList::Many(values) => values,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            ScalarOrList::One(value) => vec![value],
            ScalarOrList::Many(values) => values,
        }
    }

    /// Convert to the list form.
    pub fn normalized(self) -> Self {
        ScalarOrList::Many(self.into_vec())
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, ScalarOrList::Many(_))
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Test split size: an absolute count or a ratio of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestSplitSize {
    Count(i64),
    Fraction(f64),
}

/// Tag of the active training-policy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Supervised,
    Reinforcement,
}

impl PolicyKind {
    /// Tag stored under the policy's `type` key.
    pub fn tag(self) -> &'static str {
        match self {
            PolicyKind::Supervised => "sft",
            PolicyKind::Reinforcement => "grpo",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sft" => Some(PolicyKind::Supervised),
            "grpo" => Some(PolicyKind::Reinforcement),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Supervised fine-tuning data settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisedPolicy {
    pub dataset_name: String,
    pub dataset_subset: Option<String>,
    pub dataset_revision: Option<String>,
    pub dataset_train_split: ScalarOrList<String>,
    pub dataset_test_split: String,
    pub dataset_test_size: TestSplitSize,
    pub enable_dataset_preprocess: bool,
    pub enable_dataset_cache: bool,
    pub dataloader_num_workers: i64,
    pub dataloader_prefetch_factor: Option<i64>,
    pub enable_validation: bool,
    pub validation_freq: i64,
    pub validation_batch_per_replica: i64,
    pub conversation_column_name: String,
    pub system_prompt: String,
    pub max_pixels: i64,
    pub fps: i64,
    pub vision_asset_column_name: String,
}

/// Penalty applied to responses longer than a buffer length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlongRewardConfig {
    pub enable_overlong_penalty: bool,
    pub buffer_length: i64,
    pub penalty_factor: f64,
}

/// Reinforcement-style policy optimization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinforcementPolicy {
    pub variant: String,
    pub dataset_name: String,
    pub dataset_subset: Option<String>,
    pub dataset_revision: Option<String>,
    pub dataset_train_split: ScalarOrList<String>,
    pub enable_dataset_preprocess: bool,
    pub enable_dataset_cache: bool,
    pub dataloader_num_workers: i64,
    pub dataloader_prefetch_factor: Option<i64>,
    pub prompt_column_name: String,
    pub choices_column_name: String,
    pub response_column_name: String,
    pub system_prompt: String,
    pub max_pixels: i64,
    pub fps: i64,
    pub vision_asset_column_name: String,
    pub reward_function: ScalarOrList<String>,
    pub temperature: f64,
    pub epsilon_low: f64,
    pub epsilon_high: f64,
    pub overlong_reward: OverlongRewardConfig,
    pub kl_beta: f64,
    pub mu_iterations: i64,
    pub mini_batch: i64,
    pub allowed_outdated_steps: i64,
}

/// The active training policy. The variant is fixed when the tree is
/// first merged and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrainingPolicy {
    #[serde(rename = "sft")]
    Supervised(SupervisedPolicy),
    #[serde(rename = "grpo")]
    Reinforcement(ReinforcementPolicy),
}

impl TrainingPolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            TrainingPolicy::Supervised(_) => PolicyKind::Supervised,
            TrainingPolicy::Reinforcement(_) => PolicyKind::Reinforcement,
        }
    }

    pub fn as_reinforcement(&self) -> Option<&ReinforcementPolicy> {
        match self {
            TrainingPolicy::Reinforcement(policy) => Some(policy),
            TrainingPolicy::Supervised(_) => None,
        }
    }

    pub fn as_supervised(&self) -> Option<&SupervisedPolicy> {
        match self {
            TrainingPolicy::Supervised(policy) => Some(policy),
            TrainingPolicy::Reinforcement(_) => None,
        }
    }

    pub fn dataset_name(&self) -> &str {
        match self {
            TrainingPolicy::Supervised(p) => &p.dataset_name,
            TrainingPolicy::Reinforcement(p) => &p.dataset_name,
        }
    }

    pub fn dataset_train_split(&self) -> &ScalarOrList<String> {
        match self {
            TrainingPolicy::Supervised(p) => &p.dataset_train_split,
            TrainingPolicy::Reinforcement(p) => &p.dataset_train_split,
        }
    }

    /// Normalize the train split to list form.
    pub(crate) fn normalize_train_split(&mut self) {
        let split = match self {
            TrainingPolicy::Supervised(p) => &mut p.dataset_train_split,
            TrainingPolicy::Reinforcement(p) => &mut p.dataset_train_split,
        };
        let taken = std::mem::replace(split, ScalarOrList::Many(Vec::new()));
        *split = taken.normalized();
    }

    /// With no loader workers there is nothing to prefetch.
    pub(crate) fn normalize_dataloader(&mut self) {
        let (workers, prefetch) = match self {
            TrainingPolicy::Supervised(p) => {
                (&mut p.dataloader_num_workers, &mut p.dataloader_prefetch_factor)
            }
            TrainingPolicy::Reinforcement(p) => {
                (&mut p.dataloader_num_workers, &mut p.dataloader_prefetch_factor)
            }
        };
        if *workers <= 0 {
            *workers = 0;
            *prefetch = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_or_list_accepts_both_forms() {
        let one: ScalarOrList<String> = serde_json::from_value(json!("train")).unwrap();
        let many: ScalarOrList<String> = serde_json::from_value(json!(["a", "b"])).unwrap();

        assert_eq!(one, ScalarOrList::One("train".to_string()));
        assert_eq!(one.as_slice(), &["train".to_string()]);
        assert_eq!(many.as_slice().len(), 2);
        assert!(!one.is_normalized());
        assert!(one.normalized().is_normalized());
    }

    #[test]
    fn test_test_split_size_forms() {
        let count: TestSplitSize = serde_json::from_value(json!(100)).unwrap();
        let ratio: TestSplitSize = serde_json::from_value(json!(0.1)).unwrap();
        assert_eq!(count, TestSplitSize::Count(100));
        assert_eq!(ratio, TestSplitSize::Fraction(0.1));
    }

    #[test]
    fn test_policy_kind_tags() {
        assert_eq!(PolicyKind::Supervised.tag(), "sft");
        assert_eq!(PolicyKind::from_tag("grpo"), Some(PolicyKind::Reinforcement));
        assert_eq!(PolicyKind::from_tag("ppo"), None);
    }
}
