//! Tree addressing primitives: paths, navigation, and traversal over
//! `serde_json::Value` trees.

pub mod navigate;
pub mod path;
pub mod walk;

pub use navigate::{get, navigate, navigate_mut, set, wrap, Cursor, CursorMut};
pub use path::{IntoPath, Path, Segment};
pub use walk::{for_each, try_walk, walk, Tree, WalkOptions};
