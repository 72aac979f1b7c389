//! Content hashing of resolved configuration.
//!
//! digest = first 128 bits of SHA-256 over JCS (RFC 8785) of the value,
//! hex encoded. Collaborators use it as a cache and identity key, so a value
//! that cannot be serialized hashes to [`UNHASHABLE`] instead of failing.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::ConfigTree;

/// Digest returned for values that cannot be canonically serialized.
pub const UNHASHABLE: &str = "unhashable";

/// Digest width in bytes.
const DIGEST_BYTES: usize = 16;

/// Compute the content digest of any serializable value.
pub fn config_hash<T: Serialize>(value: &T) -> String {
    let jcs_bytes = match serde_json_canonicalizer::to_vec(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Configuration is not hashable");
            return UNHASHABLE.to_string();
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(&jcs_bytes);
    let digest = hasher.finalize();
    hex::encode(&digest[..DIGEST_BYTES])
}

/// Digest of the subtree at a dotted path, or `None` if the path does not
/// exist. An empty path hashes the whole tree.
pub fn section_hash(tree: &ConfigTree, path: &str) -> Option<String> {
    if path.is_empty() {
        return Some(config_hash(tree));
    }
    tree.get(path).map(|subtree| config_hash(&subtree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde::Serializer;
    use serde_json::json;

    struct Opaque;

    impl Serialize for Opaque {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("opaque handle"))
        }
    }

    #[test]
    fn test_digest_is_stable() {
        let value = json!({"epoch": 1, "optm_lr": 1e-6, "ckpt": {"save_mode": "async"}});
        assert_eq!(config_hash(&value), config_hash(&value.clone()));
    }

    #[test]
    fn test_digest_width() {
        let digest = config_hash(&json!({"a": 1}));
        assert_eq!(digest.len(), 32);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x": 1, "y": [1, 2]}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y": [1, 2], "x": 1}"#).unwrap();
        assert_eq!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn test_one_leaf_changes_digest() {
        let a = json!({"train": {"epoch": 1, "compile": true}});
        let b = json!({"train": {"epoch": 2, "compile": true}});
        assert_ne!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn test_unserializable_value_is_unhashable() {
        assert_eq!(config_hash(&Opaque), UNHASHABLE);
        assert_eq!(config_hash(&vec![Opaque]), UNHASHABLE);
    }
}
