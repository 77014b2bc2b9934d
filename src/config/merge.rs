//! Merging and lookup over configuration trees.
//!
//! Configuration tiers are read as JSON values and folded together before
//! being deserialized into [`super::Config`].

use serde_json::Value;

/// Merge `overlay` over `base`.
///
/// Maps merge key by key. Any other overlay value, lists included, replaces
/// the base value. A null overlay leaves the base untouched, so a key written
/// as `report:` with nothing under it does not wipe the defaults.
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
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold `deep_merge` over the tiers, lowest priority first.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

/// Walk a dotted key such as `fulid.characters`.
pub fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_object()?.get(part))
}
