//! Merge-patch diff.
//!
//! Walks the patch (not the state) bottom-up. Each patch node is compared
//! with the value currently at the same path; objects recurse, arrays and
//! scalars are compared whole, deletes remove. Every path whose value
//! differs afterwards is recorded, deleted and overwritten subtrees
//! included, children before parents.

use serde_json::{Map, Value};

use super::{
    edits_of, record_descendants, record_differences, record_subtree, Change, Diff, DiffResult,
    Patch,
};
use crate::error::{StoreError, StoreResult};
use crate::tree::{self, try_walk, Path, Segment, WalkOptions};


/// Diff `patch` against `state`. Nothing is written; apply the result with
/// [`DiffResult::apply`].
pub fn merge(state: &Value, patch: &Patch) -> StoreResult<DiffResult> {
    let normalized;
    let patch = if patch.is_normalized() {
        patch
    } else {
        normalized = patch.clone().normalized();
        &normalized
    };

    let mut changed_paths = Vec::new();
    let outcome = try_walk(
        patch,
        WalkOptions::default(),
        &mut |node: &Patch, path: &Path, children: Vec<(Segment, Diff<Change>)>| {
            let old = tree::get(state, path);
            match node {
                Patch::Delete => Ok(merge_delete(old, path, &mut changed_paths)),
                Patch::Value(new) => Ok(merge_value(old, new, path, &mut changed_paths)),
                Patch::Object(map) => {
                    merge_object(old, map.is_empty(), children, path, &mut changed_paths)
                }
            }
        },
    )?;

    Ok(DiffResult {
        changed_paths,
        outcome,
    })
}

fn merge_delete(old: Option<&Value>, path: &Path, out: &mut Vec<Path>) -> Diff<Change> {
    match old {
        Some(old) => {
            record_subtree(old, path, out);
            Diff::Deleted
        }
        None => Diff::Unchanged,
    }
}

fn merge_value(old: Option<&Value>, new: &Value, path: &Path, out: &mut Vec<Path>) -> Diff<Change> {
    if old == Some(new) {
        return Diff::Unchanged;
    }
    if let Some(old) = old {
        // An array replaced by an array notifies only the array path.
        if !(old.is_array() && new.is_array()) {
            record_descendants(old, path, out);
        }
    }
    out.push(path.clone());
    Diff::Changed(Change::Replace(new.clone()))
}

fn merge_object(
    old: Option<&Value>,
    empty: bool,
    children: Vec<(Segment, Diff<Change>)>,
    path: &Path,
    out: &mut Vec<Path>,
) -> StoreResult<Diff<Change>> {
    let edits = edits_of(children);

    if edits.is_empty() {
        // Merging nothing into an object leaves it alone; elsewhere an empty
        // patch object installs `{}`.
        if !empty || matches!(old, Some(Value::Object(_))) {
            return Ok(Diff::Unchanged);
        }
        if let Some(old) = old {
            record_descendants(old, path, out);
        }
        out.push(path.clone());
        return Ok(Diff::Changed(Change::Replace(Value::Object(Map::new()))));
    }

    match old {
        Some(Value::Object(_)) => {}
        Some(Value::Array(items)) => {
            if let Some((seg, _)) = edits.iter().find(|(s, _)| s.as_index().is_none()) {
                return Err(StoreError::KeyOnArray {
                    path: path.clone(),
                    key: seg.to_key(),
                });
            }
            check_appends(items, &edits, path)?;
            record_shifted(items, &edits, path, out);
        }
        _ => {
            // Absent or scalar target: every child was diffed against
            // nothing, so the edits describe a brand new object.
            out.push(path.clone());
            return Ok(Diff::Changed(Change::Replace(materialize(edits))));
        }
    }

    out.push(path.clone());
    Ok(Diff::Changed(Change::Edit(edits)))
}

/// Writes past the end of an array may only append, one slot after another.
fn check_appends(items: &[Value], edits: &[(Segment, Diff<Change>)], path: &Path) -> StoreResult<()> {
    let mut appended: Vec<usize> = edits
        .iter()
        .filter(|(_, diff)| !diff.is_deleted())
        .filter_map(|(seg, _)| seg.as_index())
        .filter(|index| *index >= items.len())
        .collect();
    appended.sort_unstable();

    for (expected, index) in (items.len()..).zip(appended) {
        if index != expected {
            return Err(StoreError::IndexOutOfRange {
                path: path.clone(),
                index,
                len: items.len(),
            });
        }
    }
    Ok(())
}

/// Removing an element moves every later one down a slot. Record each slot
/// from the first removal on whose value ends up different.
fn record_shifted(items: &[Value], edits: &[(Segment, Diff<Change>)], path: &Path, out: &mut Vec<Path>) {
    let first_removed = edits
        .iter()
        .filter(|(_, diff)| diff.is_deleted())
        .filter_map(|(seg, _)| seg.as_index())
        .min();
    let Some(first) = first_removed else { return };

    let mut after = Value::Array(items.to_vec());
    Change::Edit(edits.to_vec()).apply_to(&mut after);
    let after = after.as_array().map(Vec::as_slice).unwrap_or_default();

    for i in first..items.len().max(after.len()) {
        record_differences(items.get(i), after.get(i), &path.child(Segment::Index(i)), out);
    }
}

fn materialize(edits: Vec<(Segment, Diff<Change>)>) -> Value {
    let mut map = Map::new();
    for (seg, diff) in edits {
        match diff {
            Diff::Changed(Change::Replace(value)) => {
                map.insert(seg.to_key(), value);
            }
            Diff::Changed(Change::Edit(inner)) => {
                map.insert(seg.to_key(), materialize(inner));
            }
            Diff::Unchanged | Diff::Deleted => {}
        }
    }
    Value::Object(map)
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(state: &Value, patch: impl Into<Patch>) -> (Value, Vec<String>) {
        let result = merge(state, &patch.into()).unwrap();
        let paths = result.changed_paths.iter().map(|p| p.to_string()).collect();
        let mut next = state.clone();
        result.apply(&mut next).unwrap();
        (next, paths)
    }

    #[test]
    fn merges_into_nested_object() {
        let state = json!({"foo": {"bar": 1, "baz": 2}, "qux": 3});
        let (next, paths) = run(&state, json!({"foo": {"bar": 10}}));
        assert_eq!(next, json!({"foo": {"bar": 10, "baz": 2}, "qux": 3}));
        assert_eq!(paths, vec!["foo.bar", "foo", ""]);
    }

    #[test]
    fn identical_patch_changes_nothing() {
        let state = json!({"foo": {"bar": 1}, "list": [1, 2]});
        let result = merge(&state, &json!({"foo": {"bar": 1}, "list": [1, 2]}).into()).unwrap();
        assert!(result.is_unchanged());
        assert!(result.changed_paths.is_empty());
    }

    #[test]
    fn delete_records_whole_subtree() {
        let state = json!({"foo": {"bar": {"x": 1}, "l": [7]}, "keep": 1});
        let (next, paths) = run(&state, Patch::object([("foo", Patch::Delete)]));
        assert_eq!(next, json!({"keep": 1}));
        assert_eq!(paths, vec!["foo.bar.x", "foo.bar", "foo.l[0]", "foo.l", "foo", ""]);
    }

    #[test]
    fn delete_of_missing_key_is_noop() {
        let state = json!({"a": 1});
        let result = merge(&state, &Patch::object([("zzz", Patch::Delete)])).unwrap();
        assert!(result.is_unchanged());
    }

    #[test]
    fn null_is_a_value() {
        let state = json!({"a": 1});
        let (next, paths) = run(&state, json!({"a": null}));
        assert_eq!(next, json!({"a": null}));
        assert_eq!(paths, vec!["a", ""]);
    }

    #[test]
    fn scalar_over_object_records_old_descendants() {
        let state = json!({"a": {"b": {"c": 1}}});
        let (next, paths) = run(&state, json!({"a": 5}));
        assert_eq!(next, json!({"a": 5}));
        assert_eq!(paths, vec!["a.b.c", "a.b", "a", ""]);
    }

    #[test]
    fn object_over_scalar_builds_fresh_object() {
        let state = json!({"a": 5});
        let (next, paths) = run(&state, json!({"a": {"b": {"c": 1}}}));
        assert_eq!(next, json!({"a": {"b": {"c": 1}}}));
        assert_eq!(paths, vec!["a.b.c", "a.b", "a", ""]);
    }

    #[test]
    fn object_into_missing_branch() {
        let state = json!({});
        let (next, _) = run(&state, Patch::object([("a", Patch::object([("b", Patch::Delete), ("c", json!(1).into())]))]));
        assert_eq!(next, json!({"a": {"c": 1}}));
    }

    #[test]
    fn array_replaced_whole_without_element_paths() {
        let state = json!({"a": [1, 2, 3]});
        let (next, paths) = run(&state, json!({"a": [1, 2, 4]}));
        assert_eq!(next, json!({"a": [1, 2, 4]}));
        assert_eq!(paths, vec!["a", ""]);
    }

    #[test]
    fn equal_array_is_unchanged() {
        let state = json!({"a": [1, {"x": 2}]});
        assert!(merge(&state, &json!({"a": [1, {"x": 2}]}).into()).unwrap().is_unchanged());
    }

    #[test]
    fn index_overlay_on_array() {
        let state = json!({"a": [1, 2, 3]});
        let (next, paths) = run(&state, json!({"a": {"1": 20, "3": 4}}));
        assert_eq!(next, json!({"a": [1, 20, 3, 4]}));
        assert_eq!(paths, vec!["a[1]", "a[3]", "a", ""]);
    }

    #[test]
    fn index_overlay_appends_in_order() {
        let state = json!({"a": [0]});
        let (next, _) = run(&state, json!({"a": {"2": "two", "1": "one"}}));
        assert_eq!(next, json!({"a": [0, "one", "two"]}));
    }

    #[test]
    fn index_overlay_past_end_fails() {
        let state = json!({"a": [1, 2, 3]});
        let err = merge(&state, &json!({"a": {"4": 5}}).into()).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: 4, len: 3, .. }));

        let huge = json!({"a": {"18446744073709551615": 1}});
        let err = merge(&state, &huge.into()).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: usize::MAX, .. }));
    }

    #[test]
    fn index_delete_removes_element() {
        let state = json!({"a": ["x", "y", "z"]});
        let (next, _) = run(&state, Patch::Delete.wrap(&Path::parse("a[1]")));
        assert_eq!(next, json!({"a": ["x", "z"]}));
    }

    #[test]
    fn index_delete_records_shifted_slots() {
        let state = json!({"a": ["w", "x", "y", "z"]});
        let (next, paths) = run(&state, Patch::Delete.wrap(&Path::parse("a[1]")));
        assert_eq!(next, json!({"a": ["w", "y", "z"]}));
        for shifted in ["a[1]", "a[2]", "a[3]"] {
            assert!(paths.iter().any(|p| p == shifted), "{} not recorded", shifted);
        }
        assert!(!paths.iter().any(|p| p == "a[0]"));
    }

    #[test]
    fn index_delete_skips_slots_that_keep_their_value() {
        let state = json!({"a": ["x", "x", {"k": 1}, {"k": 1, "m": 2}]});
        let (_, paths) = run(&state, Patch::Delete.wrap(&Path::parse("a[1]")));
        assert!(!paths.iter().any(|p| p == "a[2].k"));
        assert!(paths.iter().any(|p| p == "a[2].m"));
        assert!(paths.iter().any(|p| p == "a[3].m"));
    }

    #[test]
    fn key_on_array_fails() {
        let state = json!({"a": [1]});
        let err = merge(&state, &json!({"a": {"name": 1}}).into()).unwrap_err();
        assert!(matches!(err, StoreError::KeyOnArray { ref key, .. } if key == "name"));
    }

    #[test]
    fn empty_object_patch() {
        let state = json!({"a": {"b": 1}, "s": 2});
        assert!(merge(&state, &json!({"a": {}}).into()).unwrap().is_unchanged());
        let (next, paths) = run(&state, json!({"s": {}, "n": {}}));
        assert_eq!(next, json!({"a": {"b": 1}, "s": {}, "n": {}}));
        assert_eq!(paths, vec!["n", "s", ""]);
    }

    #[test]
    fn root_delete_is_rejected_on_apply() {
        let state = json!({"a": 1});
        let result = merge(&state, &Patch::Delete).unwrap();
        let mut next = state.clone();
        assert!(result.apply(&mut next).is_err());
        assert_eq!(next, state);
    }

    #[test]
    fn untouched_siblings_survive() {
        let state = json!({"big": {"deep": [1, 2, {"x": 1}]}, "n": 0});
        let (next, _) = run(&state, json!({"n": 1}));
        assert_eq!(next["big"], state["big"]);
    }
}
