//! Hierarchical path addressing.
//!
//! Parses paths like `foo.bar[0].baz` into an ordered segment list and
//! formats them back. Numeric segments are array indices and render with
//! bracket notation; everything else is an object key and renders with a
//! leading dot (except directly under the root). The empty string is the
//! root path.

use std::fmt;


/// A single step within a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object key, e.g. `bar`
    Key(String),
    /// Array index, e.g. `[0]`
    Index(usize),
}

impl Segment {
    /// Classify raw segment text: canonical decimal text is an index,
    /// anything else (including `01`) a key, so `to_key` round-trips.
    pub fn from_text(text: &str) -> Self {
        let canonical = text == "0" || (!text.starts_with('0') && !text.is_empty());
        if canonical && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = text.parse::<usize>() {
                return Segment::Index(index);
            }
        }
        Segment::Key(text.to_string())
    }

    /// The object key this segment addresses. Indices map to their decimal
    /// form, which is how index segments address auto-vivified objects.
    pub fn to_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}


/// An immutable address into a tree. The empty segment list is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root path.
    pub fn root() -> Self {
        Path { segments: Vec::new() }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Path { segments }
    }

    /// Parse a dotted/bracketed string.
    ///
    /// The last segment is the text after the final `.` or `[`, stripped of
    /// a trailing `]`; the remainder is parsed the same way to produce the
    /// parent. Empty segments are dropped, so `""`, `"."` and `"a."` resolve
    /// to the root, the root and `a` respectively.
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = input;
        loop {
            let (remainder, last) = match rest.rfind(|c: char| c == '.' || c == '[') {
                Some(pos) => (Some(&rest[..pos]), &rest[pos + 1..]),
                None => (None, rest),
            };
            let last = last.strip_suffix(']').unwrap_or(last);
            if !last.is_empty() {
                segments.push(Segment::from_text(last));
            }
            match remainder {
                Some(r) => rest = r,
                None => break,
            }
        }
        segments.reverse();
        Path { segments }
    }

    /// Derive a descendant path. Strings are parsed, a `Path` is appended
    /// segment-for-segment without re-parsing, and `""` yields `self`.
    pub fn path(&self, child: impl IntoPath) -> Path {
        let child = child.into_path();
        if child.is_root() {
            return self.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(child.segments);
        Path { segments }
    }

    /// Append a single segment.
    pub fn child(&self, segment: Segment) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Path { segments }
    }

    /// The parent path. The root is its own parent.
    pub fn parent(&self) -> Path {
        match self.segments.split_last() {
            Some((_, init)) => Path { segments: init.to_vec() },
            None => self.clone(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments as text, e.g. `a.b[0].ab` -> `["a", "b", "0", "ab"]`.
    pub fn to_array(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// True if `other` lies strictly below this path.
    pub fn contains(&self, other: &Path) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// True if `other` equals this path or lies below it.
    pub fn contains_or_equals(&self, other: &Path) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// The remainder of `self` below `base`, if `base` is a prefix.
    pub fn strip_prefix(&self, base: &Path) -> Option<Path> {
        self.segments
            .strip_prefix(base.segments.as_slice())
            .map(|rest| Path { segments: rest.to_vec() })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Index(n) => write!(f, "[{}]", n)?,
                Segment::Key(k) if i == 0 => f.write_str(k)?,
                Segment::Key(k) => write!(f, ".{}", k)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::parse(&s)
    }
}


/// Anything that can name a path: strings (parsed), paths (taken as-is),
/// single segments and bare indices.
pub trait IntoPath {
    fn into_path(self) -> Path;
}

impl IntoPath for Path {
    fn into_path(self) -> Path {
        self
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Path {
        self.clone()
    }
}

impl IntoPath for &str {
    fn into_path(self) -> Path {
        Path::parse(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Path {
        Path::parse(&self)
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Path {
        Path::parse(self)
    }
}

impl IntoPath for Segment {
    fn into_path(self) -> Path {
        Path { segments: vec![self] }
    }
}

impl IntoPath for usize {
    fn into_path(self) -> Path {
        Path { segments: vec![Segment::Index(self)] }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
