//! Recursive merge of a sparse payload onto the defaults template.

use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// Overlay `patch` onto `base`. Objects merge key by key; any other value
/// replaces the leaf it lands on.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Write `value` at `path`, creating intermediate objects as needed.
pub fn insert_path(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut cursor = root;
    for segment in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        cursor = match cursor {
            Value::Object(map) => map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(map) = cursor {
        map.insert((*last).to_string(), value);
    }
}

/// Value at `path`, or `Null` when any segment is missing.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> &'a Value {
    path.iter()
        .try_fold(root, |node, segment| node.get(*segment))
        .unwrap_or(&NULL)
}
