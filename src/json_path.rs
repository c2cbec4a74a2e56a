//! Best-effort get/set of values inside nested JSON addressed by a path
//! string such as `predictions[2].bytesBase64Encoded`.
//!
//! Bracketed indices are normalized to plain segments
//! (`predictions.2.bytesBase64Encoded`). Neither operation fails: `get`
//! yields `None` on the first missing segment and `set` silently does nothing
//! when an intermediate segment is missing.

use serde_json::Value;

fn segments(path: &str) -> Vec<&str> {
    path.split(['.', '[', ']']).filter(|s| !s.is_empty()).collect()
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Returns the value at `path`, or `None` if any segment is missing.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(root, |current, segment| child(current, segment))
}

/// Assigns `value` at `path`, mutating `root` in place.
///
/// Returns whether the assignment happened. Missing intermediate segments
/// make this a no-op; no structure is created. On an array parent the final
/// segment must be an existing index.
pub fn set(root: &mut Value, path: &str, value: Value) -> bool {
    let segments = segments(path);
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        match child_mut(current, segment) {
            Some(next) => current = next,
            None => return false,
        }
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
            true
        }
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        },
        _ => false,
    }
}
