use serde_json::{Map, Value};

/// Merge `overrides` into `base`.
///
/// When both sides hold an object under the same key the two objects are
/// merged recursively; any other value in `overrides` replaces the one in
/// `base` wholesale.
pub fn deep_merge(base: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Like [`deep_merge`] but leaves both inputs untouched.
pub fn deep_merged(base: &Map<String, Value>, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    deep_merge(&mut merged, overrides.clone());
    merged
}
