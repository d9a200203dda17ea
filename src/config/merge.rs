//! Layer merge: objects merge by key, everything else is replaced.

use serde_json::Value;

/// Overlay `overlay` onto `base`.
///
/// Objects are merged key by key, recursively. Any other value in the
/// overlay, including arrays and null, replaces the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; the last layer wins.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(json!({"owner": "pubkey"}), json!({"owner": "alice"}));
        assert_eq!(result["owner"], "alice");
    }

    #[test]
    fn test_section_merges_by_key() {
        let base = json!({"capture": {"timeout_seconds": 0, "max_attempts": 3}});
        let overlay = json!({"capture": {"timeout_seconds": 30}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["capture"]["timeout_seconds"], 30);
        assert_eq!(result["capture"]["max_attempts"], 3);
    }

    #[test]
    fn test_new_key_added() {
        let result = deep_merge(json!({"owner": "pubkey"}), json!({"log": "debug"}));
        assert_eq!(result["owner"], "pubkey");
        assert_eq!(result["log"], "debug");
    }

    #[test]
    fn test_last_layer_wins() {
        let builtin = json!({"log": "info", "qr": {"invert": true}});
        let user = json!({"log": "warn", "qr": {"invert": false}});
        let cli = json!({"log": "debug"});

        let result = merge_layers(vec![builtin, user, cli]);
        assert_eq!(result["log"], "debug");
        assert_eq!(result["qr"]["invert"], false);
    }
}
