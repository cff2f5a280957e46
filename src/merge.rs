//! Structural deep merge of JSON documents.

use serde_json::{Map, Value};

/// Merge `overlay` on top of `base`, returning a new document.
///
/// Objects merge key by key, recursively. Anything else (arrays, scalars,
/// or an object meeting a non-object) is replaced wholesale by the overlay.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Value::Object(merge_maps(base_map, overlay_map))
        }
        _ => overlay.clone(),
    }
}

fn merge_maps(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let next = match merged.get(key) {
            Some(existing) => deep_merge(existing, value),
            None => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}
