//! JSON-Patch subset application over untyped documents.
//!
//! The AG-UI wire format carries `STATE_DELTA` payloads as arrays of
//! `{op, path, value?}` objects. Only `add`, `replace`, and `remove` are
//! supported; `move`, `copy`, and `test` are deliberately out of scope
//! and ignored. Application is total: it never fails the stream.

use crate::Pointer;
use serde_json::{Map, Value};
use tracing::debug;

/// A single decoded patch operation.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchOp {
    /// Set a value at the path, creating intermediate objects as needed.
    Add { path: Pointer, value: Value },
    /// Set a value at the path. Identical semantics to [`PatchOp::Add`].
    Replace { path: Pointer, value: Value },
    /// Delete the value at the path. No-op if the path does not exist.
    Remove { path: Pointer },
}

impl PatchOp {
    /// Decode one wire operation object.
    ///
    /// Returns `None` for entries missing `op` or `path`, and for
    /// unsupported or unknown op strings.
    pub fn decode(raw: &Value) -> Option<PatchOp> {
        let op = raw.get("op").and_then(Value::as_str)?;
        let path = Pointer::parse(raw.get("path").and_then(Value::as_str)?);
        let value = || raw.get("value").cloned().unwrap_or(Value::Null);
        match op {
            "add" => Some(PatchOp::Add {
                path,
                value: value(),
            }),
            "replace" => Some(PatchOp::Replace {
                path,
                value: value(),
            }),
            "remove" => Some(PatchOp::Remove { path }),
            "move" | "copy" | "test" => {
                debug!(op, %path, "unsupported patch op ignored");
                None
            }
            other => {
                debug!(op = other, %path, "unknown patch op ignored");
                None
            }
        }
    }

    /// Decode a wire delta array, skipping malformed entries.
    pub fn decode_all(raw_ops: &[Value]) -> Vec<PatchOp> {
        raw_ops.iter().filter_map(PatchOp::decode).collect()
    }
}

/// Apply patch operations to a document, in order.
pub fn apply_patch(doc: &mut Value, ops: &[PatchOp]) {
    for op in ops {
        match op {
            PatchOp::Add { path, value } | PatchOp::Replace { path, value } => {
                set_at(doc, path, value.clone());
            }
            PatchOp::Remove { path } => remove_at(doc, path),
        }
    }
}

/// Set `value` at `path`, creating intermediate objects for missing
/// segments. A numeric segment addressing an existing array writes by
/// index; index == len and the `-` marker append.
fn set_at(doc: &mut Value, path: &Pointer, value: Value) {
    let Some((head, last)) = path.split_last() else {
        *doc = value;
        return;
    };

    let mut node = doc;
    for seg in head {
        node = match descend(node, seg) {
            Some(next) => next,
            None => return,
        };
    }

    match node {
        Value::Array(arr) => {
            if last == "-" || parse_index(last) == Some(arr.len()) {
                arr.push(value);
            } else if let Some(i) = parse_index(last).filter(|i| *i < arr.len()) {
                arr[i] = value;
            } else {
                debug!(%path, "array index out of bounds; patch op dropped");
            }
        }
        Value::Object(map) => {
            map.insert(last.to_string(), value);
        }
        other => {
            // Scalar in the way: replace it with a fresh object.
            let mut map = Map::new();
            map.insert(last.to_string(), value);
            *other = Value::Object(map);
        }
    }
}

/// Step into `seg`, materializing a missing object entry.
fn descend<'a>(node: &'a mut Value, seg: &str) -> Option<&'a mut Value> {
    match node {
        Value::Array(arr) => {
            let len = arr.len();
            match parse_index(seg).filter(|i| *i < len) {
                Some(i) => Some(&mut arr[i]),
                None => {
                    debug!(segment = seg, "array index out of bounds; patch op dropped");
                    None
                }
            }
        }
        Value::Object(map) => Some(
            map.entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
        ),
        other => {
            *other = Value::Object(Map::new());
            descend(other, seg)
        }
    }
}

/// Delete the value at `path`. Missing segments anywhere along the way
/// make this a no-op.
fn remove_at(doc: &mut Value, path: &Pointer) {
    let Some((head, last)) = path.split_last() else {
        *doc = Value::Null;
        return;
    };

    let mut node = doc;
    for seg in head {
        node = match node {
            Value::Object(map) => match map.get_mut(seg.as_str()) {
                Some(next) => next,
                None => return,
            },
            Value::Array(arr) => {
                let len = arr.len();
                match parse_index(seg).filter(|i| *i < len) {
                    Some(i) => &mut arr[i],
                    None => return,
                }
            }
            _ => return,
        };
    }

    match node {
        Value::Object(map) => {
            map.remove(last);
        }
        Value::Array(arr) => {
            if let Some(i) = parse_index(last).filter(|i| *i < arr.len()) {
                arr.remove(i);
            }
        }
        _ => {}
    }
}

fn parse_index(seg: &str) -> Option<usize> {
    // Reject "+1", "01"-style forms: only canonical decimal indices.
    if seg.is_empty() || (seg.len() > 1 && seg.starts_with('0')) {
        return None;
    }
    seg.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(raw: Value) -> PatchOp {
        PatchOp::decode(&raw).expect("valid op")
    }

    #[test]
    fn add_sets_value_at_existing_path() {
        let mut doc = json!({"a": {"b": 1}});
        apply_patch(&mut doc, &[op(json!({"op": "add", "path": "/a/b", "value": 2}))]);
        assert_eq!(doc, json!({"a": {"b": 2}}));
    }

    #[test]
    fn add_creates_intermediate_objects() {
        let mut doc = json!({});
        apply_patch(
            &mut doc,
            &[op(json!({"op": "add", "path": "/a/b/c", "value": "deep"}))],
        );
        assert_eq!(doc, json!({"a": {"b": {"c": "deep"}}}));
    }

    #[test]
    fn replace_behaves_like_add() {
        let mut doc = json!({});
        apply_patch(
            &mut doc,
            &[op(json!({"op": "replace", "path": "/x/y", "value": true}))],
        );
        assert_eq!(doc, json!({"x": {"y": true}}));
    }

    #[test]
    fn remove_deletes_existing_value() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        apply_patch(&mut doc, &[op(json!({"op": "remove", "path": "/a/b"}))]);
        assert_eq!(doc, json!({"a": {"c": 2}}));
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let mut doc = json!({"a": 1});
        apply_patch(&mut doc, &[op(json!({"op": "remove", "path": "/x/y/z"}))]);
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn remove_through_scalar_is_noop() {
        let mut doc = json!({"a": 1});
        apply_patch(&mut doc, &[op(json!({"op": "remove", "path": "/a/b"}))]);
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn array_index_write_and_append() {
        let mut doc = json!({"items": [1, 2]});
        apply_patch(
            &mut doc,
            &[
                op(json!({"op": "replace", "path": "/items/0", "value": 9})),
                op(json!({"op": "add", "path": "/items/2", "value": 3})),
                op(json!({"op": "add", "path": "/items/-", "value": 4})),
            ],
        );
        assert_eq!(doc, json!({"items": [9, 2, 3, 4]}));
    }

    #[test]
    fn array_remove_shifts_elements() {
        let mut doc = json!({"items": ["a", "b", "c"]});
        apply_patch(&mut doc, &[op(json!({"op": "remove", "path": "/items/1"}))]);
        assert_eq!(doc, json!({"items": ["a", "c"]}));
    }

    #[test]
    fn out_of_bounds_index_is_dropped() {
        let mut doc = json!({"items": [1]});
        apply_patch(
            &mut doc,
            &[op(json!({"op": "add", "path": "/items/5", "value": 2}))],
        );
        assert_eq!(doc, json!({"items": [1]}));
    }

    #[test]
    fn root_path_replaces_document() {
        let mut doc = json!({"old": true});
        apply_patch(
            &mut doc,
            &[op(json!({"op": "replace", "path": "", "value": {"new": true}}))],
        );
        assert_eq!(doc, json!({"new": true}));
    }

    #[test]
    fn unsupported_ops_decode_to_none() {
        for unsupported in ["move", "copy", "test", "increment"] {
            assert_eq!(
                PatchOp::decode(&json!({"op": unsupported, "path": "/a"})),
                None
            );
        }
    }

    #[test]
    fn decode_all_skips_malformed_entries() {
        let raw = vec![
            json!({"op": "add", "path": "/a", "value": 1}),
            json!({"path": "/b"}),
            json!({"op": "remove"}),
            json!({"op": "remove", "path": "/c"}),
        ];
        let ops = PatchOp::decode_all(&raw);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn ops_apply_in_order() {
        let mut doc = json!({});
        apply_patch(
            &mut doc,
            &[
                op(json!({"op": "add", "path": "/k", "value": 1})),
                op(json!({"op": "replace", "path": "/k", "value": 2})),
                op(json!({"op": "remove", "path": "/k"})),
            ],
        );
        assert_eq!(doc, json!({}));
    }
}
