//! Generic traversal of nested mapping/array structures.
//!
//! The post-order walk hands every node the already-transformed results of
//! its children, keyed by segment, and returns the node's own result to its
//! parent. Both diff engines are built on it. Trees are acyclic by
//! construction so there is no cycle detection.

use serde_json::Value;

use super::path::{Path, Segment};


/// A node that can enumerate its children.
pub trait Tree {
    /// Children in traversal order; leaves return an empty list. Array
    /// elements are only listed when `visit_array_elements` is set.
    fn children(&self, visit_array_elements: bool) -> Vec<(Segment, &Self)>;
}

impl Tree for Value {
    fn children(&self, visit_array_elements: bool) -> Vec<(Segment, &Self)> {
        match self {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (Segment::from_text(k), v))
                .collect(),
            Value::Array(items) if visit_array_elements => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Segment::Index(i), v))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Descend into array elements (objects are always descended into).
    pub visit_array_elements: bool,
    /// For [`for_each`]: call the visitor before the children instead of after.
    pub pre_order: bool,
}

impl WalkOptions {
    pub fn with_arrays() -> Self {
        WalkOptions {
            visit_array_elements: true,
            pre_order: false,
        }
    }
}


/// Post-order transform: `visit(node, path, child_results)` for every node,
/// children first. Stops at the first error.
pub fn try_walk<N, T, E, F>(node: &N, options: WalkOptions, visit: &mut F) -> Result<T, E>
where
    N: Tree,
    F: FnMut(&N, &Path, Vec<(Segment, T)>) -> Result<T, E>,
{
    try_walk_at(node, &Path::root(), options, visit)
}

/// Infallible form of [`try_walk`].
pub fn walk<N, T, F>(node: &N, options: WalkOptions, visit: &mut F) -> T
where
    N: Tree,
    F: FnMut(&N, &Path, Vec<(Segment, T)>) -> T,
{
    let result: Result<T, std::convert::Infallible> =
        try_walk(node, options, &mut |n, p, children| Ok(visit(n, p, children)));
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Visit every node rooted at `node`, addressing paths relative to `base`.
pub fn for_each<N, F>(node: &N, base: &Path, options: WalkOptions, visit: &mut F)
where
    N: Tree,
    F: FnMut(&N, &Path),
{
    if options.pre_order {
        visit(node, base);
    }
    for (seg, child) in node.children(options.visit_array_elements) {
        for_each(child, &base.child(seg), options, visit);
    }
    if !options.pre_order {
        visit(node, base);
    }
}

fn try_walk_at<N, T, E, F>(node: &N, path: &Path, options: WalkOptions, visit: &mut F) -> Result<T, E>
where
    N: Tree,
    F: FnMut(&N, &Path, Vec<(Segment, T)>) -> Result<T, E>,
{
    let mut results = Vec::new();
    for (seg, child) in node.children(options.visit_array_elements) {
        let child_path = path.child(seg.clone());
        results.push((seg, try_walk_at(child, &child_path, options, visit)?));
    }
    visit(node, path, results)
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
