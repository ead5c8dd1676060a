//! The patch tree handed to `commit`.
//!
//! A patch mirrors the shape of the state it is merged into. Objects merge
//! key by key, [`Patch::Delete`] removes whatever sits at its position, and
//! any other value replaces the target wholesale.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::tree::{Path, Segment, Tree};


#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Remove the target.
    Delete,
    /// Replace the target. Objects stored here are merged key-wise all the
    /// same; see [`Patch::normalized`].
    Value(Value),
    /// Merge each entry into the target object (or array, by index).
    Object(BTreeMap<String, Patch>),
}

impl Patch {
    /// Build an object patch from `(key, patch)` pairs.
    ///
    /// ```
    /// use tree_store::Patch;
    /// use serde_json::json;
    ///
    /// let p = Patch::object([("gone", Patch::Delete), ("kept", json!(1).into())]);
    /// assert!(matches!(p, Patch::Object(ref m) if m.len() == 2));
    /// ```
    pub fn object<I, K>(entries: I) -> Patch
    where
        I: IntoIterator<Item = (K, Patch)>,
        K: Into<String>,
    {
        Patch::Object(entries.into_iter().map(|(k, p)| (k.into(), p)).collect())
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Patch::Delete)
    }

    /// True when no object is hiding inside a `Patch::Value`.
    pub fn is_normalized(&self) -> bool {
        match self {
            Patch::Delete => true,
            Patch::Value(v) => !v.is_object(),
            Patch::Object(map) => map.values().all(Patch::is_normalized),
        }
    }

    /// Turn every embedded JSON object into a `Patch::Object` so it merges.
    pub fn normalized(self) -> Patch {
        match self {
            Patch::Value(Value::Object(map)) => Patch::from(Value::Object(map)),
            Patch::Object(map) => {
                Patch::Object(map.into_iter().map(|(k, p)| (k, p.normalized())).collect())
            }
            other => other,
        }
    }

    /// Place this patch at `path`, nesting it in single-key objects.
    /// Index segments become decimal keys, which the merge engine applies
    /// as array positions when the target is an array.
    pub fn wrap(self, path: &Path) -> Patch {
        path.segments().iter().rev().fold(self, |inner, seg| {
            let mut map = BTreeMap::new();
            map.insert(seg.to_key(), inner);
            Patch::Object(map)
        })
    }

    /// The plain value this patch would produce on an empty target, or
    /// `None` for a delete.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Patch::Delete => None,
            Patch::Value(v) => Some(v.clone()),
            Patch::Object(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(k, p)| p.to_value().map(|v| (k.clone(), v)))
                    .collect::<Map<String, Value>>(),
            )),
        }
    }
}

impl From<Value> for Patch {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                Patch::Object(map.into_iter().map(|(k, v)| (k, Patch::from(v))).collect())
            }
            other => Patch::Value(other),
        }
    }
}

impl From<Option<Value>> for Patch {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Patch::Delete, Patch::from)
    }
}

impl Tree for Patch {
    fn children(&self, _visit_array_elements: bool) -> Vec<(Segment, &Self)> {
        match self {
            Patch::Object(map) => map.iter().map(|(k, p)| (Segment::from_text(k), p)).collect(),
            _ => Vec::new(),
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_splits_objects() {
        let p = Patch::from(json!({"a": {"b": 1}, "c": [1, {"x": 2}]}));
        let expected = Patch::object([
            ("a", Patch::object([("b", Patch::Value(json!(1)))])),
            ("c", Patch::Value(json!([1, {"x": 2}]))),
        ]);
        assert_eq!(p, expected);
        assert!(p.is_normalized());
    }

    #[test]
    fn normalize_embedded_object() {
        let p = Patch::object([("a", Patch::Value(json!({"b": 1})))]);
        assert!(!p.is_normalized());
        let n = p.normalized();
        assert!(n.is_normalized());
        assert_eq!(n, Patch::from(json!({"a": {"b": 1}})));
    }

    #[test]
    fn option_none_is_delete() {
        assert!(Patch::from(None::<Value>).is_delete());
        assert_eq!(Patch::from(Some(json!(3))), Patch::Value(json!(3)));
    }

    #[test]
    fn wrap_under_path() {
        let p = Patch::Delete.wrap(&Path::parse("a.b[2]"));
        assert_eq!(
            p,
            Patch::object([("a", Patch::object([("b", Patch::object([("2", Patch::Delete)]))]))])
        );
        assert_eq!(Patch::from(json!(1)).wrap(&Path::root()), Patch::Value(json!(1)));
    }

    #[test]
    fn to_value_drops_deletes() {
        let p = Patch::object([("gone", Patch::Delete), ("kept", Patch::from(json!({"x": 1})))]);
        assert_eq!(p.to_value(), Some(json!({"kept": {"x": 1}})));
        assert_eq!(Patch::Delete.to_value(), None);
    }

    #[test]
    fn tree_children_use_segments() {
        let p = Patch::from(json!({"0": 1, "name": 2}));
        let segs: Vec<Segment> = p.children(false).into_iter().map(|(s, _)| s).collect();
        assert_eq!(segs, vec![Segment::Index(0), Segment::Key("name".into())]);
    }
}
