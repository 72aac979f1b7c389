//! trainconf - configuration for a distributed policy-training orchestrator
//!
//! A run is configured by overlaying a nested override mapping onto the
//! defaults declared in the schema table, then validating the result:
//!
//! ```no_run
//! use serde_json::json;
//! use trainconf::Resolver;
//!
//! let resolver = Resolver::new()?;
//! let tree = resolver.resolve(json!({
//!     "train": {"train_policy": {"kl_beta": 0.01, "reward_function": "boxed_math"}},
//! }))?;
//! println!("{}", trainconf::config_hash(&tree));
//! # Ok::<(), trainconf::ConfigError>(())
//! ```
//!
//! The training policy is a tagged union of supervised fine-tuning and
//! reinforcement learning. Which one applies is decided from the override
//! keys (see [`variant`]) and fixed for the lifetime of the tree.

pub mod config;
pub mod env;
pub mod error;
pub mod hash;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod resolver;
pub mod schema;
pub mod validate;
pub mod variant;

pub use config::{ConfigTree, KeyValues, PolicyKind, TrainingPolicy};
pub use env::{Environment, FixedEnvironment, ProcessEnvironment};
pub use error::ConfigError;
pub use hash::{config_hash, section_hash, UNHASHABLE};
pub use loader::{OverrideLayers, OverrideOrigin, OverrideSource};
pub use merge::{deep_merge, merge_layers, merge_overrides};
pub use resolver::Resolver;
pub use validate::{validate, ValidationError};
pub use trainconf_schema::{FieldDescriptor, FieldKind, FieldSpec, RecordSchema, SchemaError};
