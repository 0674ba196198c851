//! The recursive merge used to replay `append`-mode updates.
//!
//! Both `append` and `replace` are idempotent against the anchor body: applying
//! the same envelope twice to any base yields the same result as applying it
//! once. This is what makes it safe for the [`crate`] processor to
//! re-replay updates whose processed-reaction acknowledgement failed after a
//! successful body write.

use serde_json::Value;

use crate::envelope::UpdateMode;

/// Apply one update payload to `base` under the given mode.
#[must_use]
pub fn apply_update(base: &Value, update: &Value, mode: UpdateMode) -> Value {
    match mode {
        UpdateMode::Replace => update.clone(),
        UpdateMode::Append => merge_append(base, update),
    }
}

/// Recursive merge: for matching object keys, recurse; otherwise the update
/// value wins outright (arrays and scalars replace wholesale). Keys present
/// only in `base` are preserved.
fn merge_append(base: &Value, update: &Value) -> Value {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            let mut result = base_map.clone();
            for (key, update_value) in update_map {
                let merged = match result.get(key) {
                    Some(base_value) => merge_append(base_value, update_value),
                    None => update_value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Value::Object(result)
        }
        _ => update.clone(),
    }
}
