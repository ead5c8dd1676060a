//! Commit records.
//!
//! A commit is created once per `commit`/`reset` call (and once per
//! subscription replay) and never changes afterwards. Subscribers receive
//! it alongside their values; its `cause` chain tells them which commit's
//! callbacks triggered it.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::Patch;
use crate::tree::Path;

// ---------------------------------------------------------------------------
// CommitMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Merge-patch update.
    Commit,
    /// Scoped replacement.
    Reset,
    /// Synthetic notification sent to a new subscriber.
    Replay,
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommitMode::Commit => "commit",
            CommitMode::Reset => "reset",
            CommitMode::Replay => "replay",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// What a commit asks the store to do. Paths are absolute.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Merge(Patch),
    Replace { value: Value, base: Path },
    Replay,
}

impl Operation {
    pub fn mode(&self) -> CommitMode {
        match self {
            Operation::Merge(_) => CommitMode::Commit,
            Operation::Replace { .. } => CommitMode::Reset,
            Operation::Replay => CommitMode::Replay,
        }
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Commit {
    id: u64,
    message: String,
    operation: Operation,
    cause: Option<Rc<Commit>>,
    depth: usize,
}

impl Commit {
    /// `depth` follows from `cause`: one more than the cause, or zero.
    pub(crate) fn new(id: u64, message: String, operation: Operation, cause: Option<Rc<Commit>>) -> Self {
        let depth = cause.as_ref().map_or(0, |c| c.depth + 1);
        Commit {
            id,
            message,
            operation,
            cause,
            depth,
        }
    }

    /// Sequence number, unique within one store.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn mode(&self) -> CommitMode {
        self.operation.mode()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The merge patch, for `commit` records.
    pub fn patch(&self) -> Option<&Patch> {
        match &self.operation {
            Operation::Merge(patch) => Some(patch),
            _ => None,
        }
    }

    /// The commit whose callbacks issued this one.
    pub fn cause(&self) -> Option<&Rc<Commit>> {
        self.cause.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// This commit followed by each of its causes, nearest first.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// The first commit in the causal chain (the one a caller issued).
    pub fn root_cause(&self) -> &Commit {
        self.chain().last().unwrap_or(self)
    }

    /// `depth : message` lines for the nearest `frames` commits of the chain.
    pub fn render_trace(&self, frames: usize) -> String {
        self.chain()
            .take(frames)
            .map(|c| format!("{} : {}", c.depth, c.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Iterator over a causal chain.
pub struct Chain<'a> {
    next: Option<&'a Commit>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Commit;

    fn next(&mut self) -> Option<&'a Commit> {
        let current = self.next?;
        self.next = current.cause.as_deref();
        Some(current)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain_of(n: usize) -> Rc<Commit> {
        let mut current: Option<Rc<Commit>> = None;
        for i in 0..n {
            let op = Operation::Merge(Patch::from(json!({"n": i})));
            current = Some(Rc::new(Commit::new(i as u64, format!("step {}", i), op, current.take())));
        }
        current.unwrap()
    }

    #[test]
    fn depth_follows_cause() {
        let c = chain_of(3);
        assert_eq!(c.depth(), 2);
        assert_eq!(c.cause().unwrap().depth(), 1);
        assert_eq!(c.root_cause().message(), "step 0");
        assert!(c.root_cause().cause().is_none());
    }

    #[test]
    fn chain_walks_nearest_first() {
        let c = chain_of(4);
        let messages: Vec<&str> = c.chain().map(|c| c.message()).collect();
        assert_eq!(messages, vec!["step 3", "step 2", "step 1", "step 0"]);
    }

    #[test]
    fn trace_is_bounded() {
        let c = chain_of(5);
        assert_eq!(c.render_trace(2), "4 : step 4\n3 : step 3");
        assert_eq!(c.render_trace(100).lines().count(), 5);
    }

    #[test]
    fn mode_and_patch() {
        let merge = Commit::new(0, "m".into(), Operation::Merge(Patch::Delete), None);
        assert_eq!(merge.mode(), CommitMode::Commit);
        assert_eq!(merge.patch(), Some(&Patch::Delete));

        let reset = Commit::new(1, "r".into(), Operation::Replace { value: json!(1), base: Path::root() }, None);
        assert_eq!(reset.mode(), CommitMode::Reset);
        assert!(reset.patch().is_none());
        assert_eq!(reset.mode().to_string(), "reset");
    }

    #[test]
    fn mode_serializes_snake_case() {
        assert_eq!(serde_json::to_value(CommitMode::Replay).unwrap(), json!("replay"));
        let m: CommitMode = serde_json::from_value(json!("commit")).unwrap();
        assert_eq!(m, CommitMode::Commit);
    }
}
