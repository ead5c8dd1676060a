//! Scoped replacement diff.
//!
//! Makes the subtree at `base` equal to a replacement value. Walks the
//! state (array elements included); nodes outside the base's scope are left
//! alone, nodes under it are compared against the replacement, and the
//! nodes on the way down to the base are rebuilt only where something
//! below them changed. A base that does not exist yet is grafted in,
//! creating intermediate objects.

use serde_json::Value;

use super::{edits_of, record_descendants, record_subtree, Change, Diff, DiffResult};
use crate::error::{StoreError, StoreResult};
use crate::tree::{self, try_walk, wrap, Path, Segment, WalkOptions};


/// Diff replacing the subtree at `base` with `replacement`.
pub fn replace(state: &Value, replacement: &Value, base: &Path) -> StoreResult<DiffResult> {
    let mut changed_paths = Vec::new();
    let outcome = try_walk(
        state,
        WalkOptions::with_arrays(),
        &mut |old: &Value, path: &Path, children: Vec<(Segment, Diff<Change>)>| {
            if let Some(relative) = path.strip_prefix(base) {
                let new = tree::get(replacement, &relative);
                Ok(replace_within(old, new, path, children, &mut changed_paths))
            } else if path.contains(base) {
                replace_spine(old, path, base, replacement, children, &mut changed_paths)
            } else {
                Ok(Diff::Unchanged)
            }
        },
    )?;

    Ok(DiffResult {
        changed_paths,
        outcome,
    })
}

/// A node at or below the base.
fn replace_within(
    old: &Value,
    new: Option<&Value>,
    path: &Path,
    children: Vec<(Segment, Diff<Change>)>,
    out: &mut Vec<Path>,
) -> Diff<Change> {
    let Some(new) = new else {
        // Descendants already recorded themselves on the way up.
        out.push(path.clone());
        return Diff::Deleted;
    };

    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut edits = edits_of(children);
            for (key, value) in new_map {
                if !old_map.contains_key(key) {
                    let seg = Segment::from_text(key);
                    record_subtree(value, &path.child(seg.clone()), out);
                    edits.push((seg, Diff::Changed(Change::Replace(value.clone()))));
                }
            }
            if edits.is_empty() {
                Diff::Unchanged
            } else {
                out.push(path.clone());
                Diff::Changed(Change::Edit(edits))
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            if old_items == new_items {
                return Diff::Unchanged;
            }
            for (i, value) in new_items.iter().enumerate().skip(old_items.len()) {
                record_subtree(value, &path.child(Segment::Index(i)), out);
            }
            out.push(path.clone());
            Diff::Changed(Change::Replace(new.clone()))
        }
        _ if old == new => Diff::Unchanged,
        _ => {
            if new.is_object() || new.is_array() {
                record_descendants(new, path, out);
            }
            out.push(path.clone());
            Diff::Changed(Change::Replace(new.clone()))
        }
    }
}

/// A strict ancestor of the base.
fn replace_spine(
    old: &Value,
    path: &Path,
    base: &Path,
    replacement: &Value,
    children: Vec<(Segment, Diff<Change>)>,
    out: &mut Vec<Path>,
) -> StoreResult<Diff<Change>> {
    let below = &base.segments()[path.len()..];
    let next = &below[0];

    let descends = match (old, next) {
        (Value::Object(map), _) => map.contains_key(&next.to_key()),
        (Value::Array(items), Segment::Index(i)) => *i < items.len(),
        (Value::Array(_), Segment::Key(key)) => {
            return Err(StoreError::KeyOnArray {
                path: path.clone(),
                key: key.clone(),
            })
        }
        _ => {
            // A scalar sits where the base should hang: replace it with a
            // fresh branch.
            let fresh = wrap(&Path::from_segments(below.to_vec()), replacement.clone());
            record_descendants(&fresh, path, out);
            out.push(path.clone());
            return Ok(Diff::Changed(Change::Replace(fresh)));
        }
    };

    if descends {
        let edits = edits_of(children);
        if edits.is_empty() {
            return Ok(Diff::Unchanged);
        }
        out.push(path.clone());
        return Ok(Diff::Changed(Change::Edit(edits)));
    }

    // The next spine segment is missing: graft the replacement in.
    if let (Value::Array(items), Segment::Index(index)) = (old, next) {
        if *index > items.len() {
            return Err(StoreError::IndexOutOfRange {
                path: path.clone(),
                index: *index,
                len: items.len(),
            });
        }
    }
    let grafted = wrap(&Path::from_segments(below[1..].to_vec()), replacement.clone());
    record_subtree(&grafted, &path.child(next.clone()), out);
    out.push(path.clone());
    Ok(Diff::Changed(Change::Edit(vec![(
        next.clone(),
        Diff::Changed(Change::Replace(grafted)),
    )])))
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(state: &Value, replacement: Value, base: &str) -> (Value, Vec<String>) {
        let result = replace(state, &replacement, &Path::parse(base)).unwrap();
        let paths = result.changed_paths.iter().map(|p| p.to_string()).collect();
        let mut next = state.clone();
        result.apply(&mut next).unwrap();
        (next, paths)
    }

    fn sorted(mut paths: Vec<String>) -> Vec<String> {
        paths.sort();
        paths
    }

    #[test]
    fn reset_root_case_1() {
        // Keys missing from the replacement go away.
        let (next, paths) = run(&json!({"a": 1, "b": 2}), json!({"a": 1}), "");
        assert_eq!(next, json!({"a": 1}));
        assert_eq!(paths, vec!["b", ""]);
    }

    #[test]
    fn reset_root_case_2() {
        let (next, paths) = run(&json!({"a": {"x": 1}, "b": 2}), json!({"a": {"y": 2}, "b": 2}), "");
        assert_eq!(next, json!({"a": {"y": 2}, "b": 2}));
        assert_eq!(sorted(paths), vec!["", "a", "a.x", "a.y"]);
    }

    #[test]
    fn reset_root_case_3() {
        // Scalar becomes object: every new path is reported.
        let (next, paths) = run(&json!({"a": 1}), json!({"a": {"b": {"c": 1}}}), "");
        assert_eq!(next, json!({"a": {"b": {"c": 1}}}));
        assert_eq!(paths, vec!["a.b.c", "a.b", "a", ""]);
    }

    #[test]
    fn reset_root_case_4() {
        // Object becomes scalar: old descendants report as deleted.
        let (next, paths) = run(&json!({"a": {"b": {"c": 1}}}), json!({"a": 1}), "");
        assert_eq!(next, json!({"a": 1}));
        assert_eq!(paths, vec!["a.b.c", "a.b", "a", ""]);
    }

    #[test]
    fn reset_root_case_5() {
        // Arrays: changed elements and appended ones are reported.
        let (next, paths) = run(&json!({"l": [1, 2]}), json!({"l": [1, 3, 4]}), "");
        assert_eq!(next, json!({"l": [1, 3, 4]}));
        assert_eq!(sorted(paths), vec!["", "l", "l[1]", "l[2]"]);
    }

    #[test]
    fn reset_root_case_6() {
        // Shrinking arrays report the dropped tail.
        let (next, paths) = run(&json!({"l": [1, 2, 3]}), json!({"l": [1]}), "");
        assert_eq!(next, json!({"l": [1]}));
        assert_eq!(sorted(paths), vec!["", "l", "l[1]", "l[2]"]);
    }

    #[test]
    fn identical_reset_is_unchanged() {
        let state = json!({"a": {"b": [1, {"c": 2}]}});
        let result = replace(&state, &state.clone(), &Path::root()).unwrap();
        assert!(result.is_unchanged());
        assert!(result.changed_paths.is_empty());
    }

    #[test]
    fn scoped_reset_leaves_siblings() {
        let state = json!({"foo": {"bar": {"x": 1, "y": 2}}, "other": {"z": 1}});
        let (next, paths) = run(&state, json!({"x": 5}), "foo.bar");
        assert_eq!(next, json!({"foo": {"bar": {"x": 5}}, "other": {"z": 1}}));
        assert_eq!(sorted(paths), vec!["", "foo", "foo.bar", "foo.bar.x", "foo.bar.y"]);
    }

    #[test]
    fn scoped_reset_grafts_missing_base() {
        let state = json!({"foo": {"keep": 1}});
        let (next, paths) = run(&state, json!({"v": 1}), "foo.new.deep");
        assert_eq!(next, json!({"foo": {"keep": 1, "new": {"deep": {"v": 1}}}}));
        assert_eq!(paths, vec!["foo.new.deep.v", "foo.new.deep", "foo.new", "foo", ""]);
    }

    #[test]
    fn scoped_reset_through_scalar() {
        let (next, paths) = run(&json!({"foo": 3}), json!(true), "foo.bar");
        assert_eq!(next, json!({"foo": {"bar": true}}));
        assert_eq!(paths, vec!["foo.bar", "foo", ""]);
    }

    #[test]
    fn scoped_reset_into_array_element() {
        let state = json!({"list": [{"a": 1}, {"a": 2}]});
        let (next, paths) = run(&state, json!({"a": 3}), "list[1]");
        assert_eq!(next, json!({"list": [{"a": 1}, {"a": 3}]}));
        assert_eq!(paths, vec!["list[1].a", "list[1]", "list", ""]);
    }

    #[test]
    fn scoped_reset_key_on_array_fails() {
        let state = json!({"list": [1]});
        let err = replace(&state, &json!(1), &Path::parse("list.name")).unwrap_err();
        assert!(matches!(err, StoreError::KeyOnArray { .. }));
    }

    #[test]
    fn scoped_reset_appends_array_element() {
        let (next, paths) = run(&json!({"list": [1]}), json!({"a": 2}), "list[1]");
        assert_eq!(next, json!({"list": [1, {"a": 2}]}));
        assert_eq!(paths, vec!["list[1].a", "list[1]", "list", ""]);
    }

    #[test]
    fn scoped_reset_past_array_end_fails() {
        let state = json!({"list": [1]});
        let err = replace(&state, &json!(1), &Path::parse("list[5]")).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: 5, len: 1, .. }));
        let far = Path::parse("list").path(usize::MAX);
        assert!(replace(&state, &json!(1), &far).is_err());
    }

    #[test]
    fn reset_to_scalar_root_value() {
        let (next, paths) = run(&json!({"a": 1}), json!(7), "");
        assert_eq!(next, json!(7));
        assert_eq!(paths, vec!["a", ""]);
    }
}
