//! Path-based reads and writes on a `serde_json::Value` tree.
//!
//! Reads never fail: a missing key, an out-of-range index, or a scalar
//! in the middle of the path all resolve to `None`. Writes auto-vivify
//! empty objects at missing intermediates and refuse the root path.

use serde_json::{Map, Value};

use super::path::{IntoPath, Path, Segment};
use crate::error::{value_kind, StoreError, StoreResult};


/// Read-only cursor returned by [`navigate`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    root: &'a Value,
    path: Path,
}

impl<'a> Cursor<'a> {
    /// Descend further.
    pub fn path(&self, sub: impl IntoPath) -> Cursor<'a> {
        Cursor {
            root: self.root,
            path: self.path.path(sub),
        }
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Option<&'a Value> {
        get(self.root, &self.path)
    }
}

/// Mutable cursor returned by [`navigate_mut`].
#[derive(Debug)]
pub struct CursorMut<'a> {
    root: &'a mut Value,
    path: Path,
}

impl<'a> CursorMut<'a> {
    pub fn path(self, sub: impl IntoPath) -> CursorMut<'a> {
        let path = self.path.path(sub);
        CursorMut { root: self.root, path }
    }

    pub fn get(&self) -> Option<&Value> {
        get(self.root, &self.path)
    }

    /// Assign `value` at the cursor, creating intermediates. Returns the
    /// (mutated in place) root.
    pub fn set(self, value: Value) -> StoreResult<&'a mut Value> {
        set(self.root, &self.path, value)?;
        Ok(self.root)
    }
}

/// Start a read-only navigation at `root`.
pub fn navigate(root: &Value) -> Cursor<'_> {
    Cursor {
        root,
        path: Path::root(),
    }
}

/// Start a mutating navigation at `root`.
pub fn navigate_mut(root: &mut Value) -> CursorMut<'_> {
    CursorMut {
        root,
        path: Path::root(),
    }
}


/// Value at `path`, or `None` as soon as the walk leaves the tree.
pub fn get<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |target, seg| child(target, seg))
}

/// Direct child of a container. Index segments on objects look up the
/// decimal key; key segments on arrays resolve to nothing.
pub fn child<'a>(target: &'a Value, seg: &Segment) -> Option<&'a Value> {
    match (target, seg) {
        (Value::Object(map), Segment::Key(k)) => map.get(k),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        _ => None,
    }
}

/// Assign `value` at `path`, auto-vivifying missing intermediates as empty
/// objects. An array index may address an existing slot or append exactly
/// one past the end; anything further is `IndexOutOfRange`.
pub fn set(root: &mut Value, path: &Path, value: Value) -> StoreResult<()> {
    let Some((last, init)) = path.segments().split_last() else {
        return Err(StoreError::RootPath { operation: "set" });
    };

    let mut target = root;
    let mut walked = Path::root();
    for seg in init {
        target = child_or_insert(target, seg, &walked)?;
        walked = walked.child(seg.clone());
    }
    *child_or_insert(target, last, &walked)? = value;
    Ok(())
}

/// Build a fresh tree holding `value` at `path` (objects all the way down).
pub fn wrap(path: &Path, value: Value) -> Value {
    path.segments().iter().rev().fold(value, |inner, seg| {
        let mut map = Map::new();
        map.insert(seg.to_key(), inner);
        Value::Object(map)
    })
}

/// Overwrite the slot at `index`, or append when `index` is past the end.
/// Callers have already checked `index <= items.len()`.
pub(crate) fn set_index(items: &mut Vec<Value>, index: usize, value: Value) {
    match items.get_mut(index) {
        Some(slot) => *slot = value,
        None => items.push(value),
    }
}

fn child_or_insert<'a>(
    target: &'a mut Value,
    seg: &Segment,
    at: &Path,
) -> StoreResult<&'a mut Value> {
    match target {
        Value::Object(map) => Ok(map
            .entry(seg.to_key())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => match seg {
            Segment::Index(i) => {
                let len = items.len();
                if *i > len {
                    return Err(StoreError::IndexOutOfRange {
                        path: at.clone(),
                        index: *i,
                        len,
                    });
                }
                if *i == len {
                    items.push(Value::Object(Map::new()));
                }
                Ok(&mut items[*i])
            }
            Segment::Key(k) => Err(StoreError::KeyOnArray {
                path: at.clone(),
                key: k.clone(),
            }),
        },
        other => Err(StoreError::NotAContainer {
            path: at.clone(),
            found: value_kind(other),
        }),
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
