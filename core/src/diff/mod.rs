//! Change computation: merge-patch and scoped-replace diffs.
//!
//! Both engines run read-only against the current state and produce a
//! [`DiffResult`]: the list of changed paths (for event fan-out) plus a
//! [`Change`] tree describing only the modified spine. Applying the change
//! afterwards rewrites those nodes in place and leaves every untouched
//! subtree alone, so a failed diff never leaves a half-written state.

pub mod merge;
pub mod patch;
pub mod replace;

pub use merge::merge;
pub use patch::Patch;
pub use replace::replace;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::tree::navigate::set_index;
use crate::tree::{for_each, Path, Segment, WalkOptions};


/// Outcome of diffing one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff<T> {
    /// Nothing to do at this node or below.
    Unchanged,
    /// The node is removed from its parent.
    Deleted,
    /// The node takes a new value.
    Changed(T),
}

impl<T> Diff<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Diff::Unchanged)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Diff::Deleted)
    }
}

/// How a changed node gets its new value.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Overwrite the node wholesale.
    Replace(Value),
    /// Keep the existing container and apply per-child edits.
    Edit(Vec<(Segment, Diff<Change>)>),
}

impl Change {
    /// Rewrite `target` in place.
    pub fn apply_to(self, target: &mut Value) {
        let edits = match self {
            Change::Replace(value) => {
                *target = value;
                return;
            }
            Change::Edit(edits) => edits,
        };

        match target {
            Value::Object(map) => {
                for (seg, diff) in edits {
                    let key = seg.to_key();
                    match diff {
                        Diff::Unchanged => {}
                        Diff::Deleted => {
                            map.remove(&key);
                        }
                        Diff::Changed(Change::Replace(value)) => {
                            map.insert(key, value);
                        }
                        Diff::Changed(change) => {
                            if let Some(child) = map.get_mut(&key) {
                                change.apply_to(child);
                            }
                        }
                    }
                }
            }
            Value::Array(items) => {
                let mut indexed: Vec<(usize, Diff<Change>)> = edits
                    .into_iter()
                    .filter_map(|(seg, diff)| seg.as_index().map(|i| (i, diff)))
                    .collect();
                // Appends must land in index order.
                indexed.sort_by_key(|(index, _)| *index);

                let mut removed = Vec::new();
                for (index, diff) in indexed {
                    match diff {
                        Diff::Unchanged => {}
                        Diff::Deleted => removed.push(index),
                        Diff::Changed(Change::Replace(value)) => set_index(items, index, value),
                        Diff::Changed(change) => {
                            if let Some(child) = items.get_mut(index) {
                                change.apply_to(child);
                            }
                        }
                    }
                }
                // Remove back to front so earlier indices stay valid.
                removed.dedup();
                for index in removed.into_iter().rev() {
                    if index < items.len() {
                        items.remove(index);
                    }
                }
            }
            _ => {}
        }
    }
}


/// Result of a merge or replace computation.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    /// Every path whose value changed, children before parents.
    pub changed_paths: Vec<Path>,
    /// What happens to the root.
    pub outcome: Diff<Change>,
}

impl DiffResult {
    pub fn is_unchanged(&self) -> bool {
        self.outcome.is_unchanged()
    }

    /// Apply the computed change to `state`. The root itself can never be
    /// deleted; that is rejected before anything is written.
    pub fn apply(self, state: &mut Value) -> StoreResult<()> {
        match self.outcome {
            Diff::Unchanged => Ok(()),
            Diff::Deleted => Err(StoreError::RootPath { operation: "delete" }),
            Diff::Changed(change) => {
                change.apply_to(state);
                Ok(())
            }
        }
    }
}


/// Record `at` and every path below it in `value`, array elements included.
pub(crate) fn record_subtree(value: &Value, at: &Path, out: &mut Vec<Path>) {
    for_each(value, at, WalkOptions::with_arrays(), &mut |_: &Value, p: &Path| {
        out.push(p.clone())
    });
}

/// Record every path strictly below `at` in `value`.
pub(crate) fn record_descendants(value: &Value, at: &Path, out: &mut Vec<Path>) {
    for_each(value, at, WalkOptions::with_arrays(), &mut |_: &Value, p: &Path| {
        if p != at {
            out.push(p.clone());
        }
    });
}

/// Record every path at or below `at` whose value differs between `old`
/// and `new`, children before parents.
pub(crate) fn record_differences(
    old: Option<&Value>,
    new: Option<&Value>,
    at: &Path,
    out: &mut Vec<Path>,
) {
    if old == new {
        return;
    }
    match (old, new) {
        (Some(Value::Object(before)), Some(Value::Object(after))) => {
            let added = after.keys().filter(|k| !before.contains_key(*k));
            for key in before.keys().chain(added) {
                let child = at.child(Segment::from_text(key));
                record_differences(before.get(key), after.get(key), &child, out);
            }
        }
        (Some(Value::Array(before)), Some(Value::Array(after))) => {
            for i in 0..before.len().max(after.len()) {
                let child = at.child(Segment::Index(i));
                record_differences(before.get(i), after.get(i), &child, out);
            }
        }
        _ => {
            for value in [old, new].into_iter().flatten() {
                record_descendants(value, at, out);
            }
        }
    }
    out.push(at.clone());
}

/// Keep only the children that did something.
pub(crate) fn edits_of(children: Vec<(Segment, Diff<Change>)>) -> Vec<(Segment, Diff<Change>)> {
    children.into_iter().filter(|(_, d)| !d.is_unchanged()).collect()
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
