//! Canonical JSON encoding and SHA-256 digests for persisted payloads.
//!
//! Object keys are sorted by UTF-16 code units so that the digest does not
//! depend on field declaration order or map iteration order.

use sha2::{Digest, Sha256};

/// Recursively sort JSON object keys using UTF-16 code unit ordering.
fn sort_keys_utf16(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys_utf16(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_keys_utf16).collect())
        }
        other => other.clone(),
    }
}

/// Compact JSON with sorted keys.
pub fn canonical_json(value: &serde_json::Value) -> serde_json::Result<String> {
    serde_json::to_string(&sort_keys_utf16(value))
}

/// SHA-256 hex digest of the canonical JSON encoding of `value`.
pub fn compute_digest(value: &serde_json::Value) -> serde_json::Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_field_order_invariant() {
        let a = json!({"b": 1, "a": {"z": 1, "y": [3, 1]}});
        let b = json!({"a": {"y": [3, 1], "z": 1}, "b": 1});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(canonical_json(&a).unwrap(), r#"{"a":{"y":[3,1],"z":1},"b":1}"#);
    }

    #[test]
    fn test_array_order_changes_digest() {
        let a = compute_digest(&json!({"scores": [1, 2]})).unwrap();
        let b = compute_digest(&json!({"scores": [2, 1]})).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
