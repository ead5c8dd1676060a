//! Commit scheduling: the call stack, the reentrancy queue, and metrics.
//!
//! The scheduler itself never runs diffs or callbacks; the store core
//! drives it. It hands out commits (wiring `cause` to whatever commit is
//! currently dispatching), queues commits issued while busy, and remembers
//! a recursion failure until the outermost commit unwinds.

use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::commit::{Commit, Operation};
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// SchedulerStats
// ---------------------------------------------------------------------------

/// Counters over the lifetime of one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Commits whose diff was computed and applied.
    pub executed: u64,
    /// Commits deferred to the queue because another was dispatching.
    pub queued: u64,
    /// Commits whose diff failed.
    pub failed: u64,
    /// Queued commits thrown away by a recursion failure.
    pub discarded: u64,
    /// Commits refused at the depth ceiling.
    pub rejected: u64,
    /// Callback invocations (immediate) and queue pushes (deferred).
    pub notifications: u64,
    pub max_queue_len: usize,
    pub max_depth: usize,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Recursion failure remembered until the outermost commit returns.
#[derive(Debug, Clone)]
struct Halt {
    depth: usize,
    trace: String,
}

impl Halt {
    fn to_error(&self) -> StoreError {
        StoreError::RecursionLimit {
            depth: self.depth,
            trace: self.trace.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    queue: VecDeque<Rc<Commit>>,
    /// Commits whose callbacks are currently running, innermost last.
    stack: Vec<Rc<Commit>>,
    busy: bool,
    halt: Option<Halt>,
    next_id: u64,
    stats: SchedulerStats,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Scheduler::default()
    }

    /// Create a commit caused by the innermost dispatching commit, if any.
    pub(crate) fn create(&mut self, message: String, operation: Operation) -> Rc<Commit> {
        let id = self.next_id;
        self.next_id += 1;
        let cause = self.stack.last().cloned();
        Rc::new(Commit::new(id, message, operation, cause))
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }

    /// Claim the scheduler for an outermost commit.
    pub(crate) fn begin(&mut self) {
        self.busy = true;
    }

    /// Release the scheduler. Returns the recursion failure, if one
    /// happened while busy.
    pub(crate) fn finish(&mut self) -> Option<StoreError> {
        self.busy = false;
        self.stack.clear();
        self.halt.take().map(|h| h.to_error())
    }

    /// Drop all pending work and release the scheduler after a run that
    /// did not reach [`Scheduler::finish`]. Returns how many queued commits
    /// were dropped.
    pub(crate) fn abort(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.stack.clear();
        self.halt = None;
        self.busy = false;
        self.stats.discarded += dropped as u64;
        dropped
    }

    pub(crate) fn enqueue(&mut self, commit: Rc<Commit>) {
        self.queue.push_back(commit);
        self.stats.queued += 1;
        self.stats.max_queue_len = self.stats.max_queue_len.max(self.queue.len());
    }

    /// Next queued commit, unless a recursion failure halted the run.
    pub(crate) fn dequeue(&mut self) -> Option<Rc<Commit>> {
        if self.halt.is_some() {
            return None;
        }
        self.queue.pop_front()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn push(&mut self, commit: Rc<Commit>) {
        self.stack.push(commit);
    }

    pub(crate) fn pop(&mut self) {
        self.stack.pop();
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    /// The pending recursion failure, re-raised for any commit attempted
    /// before the run unwinds.
    pub(crate) fn halted_error(&self) -> Option<StoreError> {
        self.halt.as_ref().map(Halt::to_error)
    }

    /// Discard all pending work and remember the failure. Returns how many
    /// queued commits were dropped.
    pub(crate) fn halt(&mut self, depth: usize, trace: String) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.stack.clear();
        self.halt = Some(Halt { depth, trace });
        self.stats.rejected += 1;
        self.stats.discarded += dropped as u64;
        dropped
    }

    pub(crate) fn record_rejected(&mut self) {
        self.stats.rejected += 1;
    }

    pub(crate) fn record_executed(&mut self, depth: usize) {
        self.stats.executed += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);
    }

    pub(crate) fn record_failed(&mut self) {
        self.stats.failed += 1;
    }

    pub(crate) fn record_notification(&mut self) {
        self.stats.notifications += 1;
    }

    pub(crate) fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Patch;

    fn op() -> Operation {
        Operation::Merge(Patch::Delete)
    }

    #[test]
    fn cause_is_stack_top() {
        let mut s = Scheduler::new();
        let a = s.create("a".into(), op());
        assert!(a.cause().is_none());
        assert_eq!(a.depth(), 0);

        s.push(Rc::clone(&a));
        let b = s.create("b".into(), op());
        assert!(Rc::ptr_eq(b.cause().unwrap(), &a));
        assert_eq!(b.depth(), 1);

        s.pop();
        let c = s.create("c".into(), op());
        assert!(c.cause().is_none());
    }

    #[test]
    fn ids_increase() {
        let mut s = Scheduler::new();
        let ids: Vec<u64> = (0..3).map(|_| s.create("x".into(), op()).id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn queue_is_fifo() {
        let mut s = Scheduler::new();
        for m in ["1", "2", "3"] {
            let c = s.create(m.into(), op());
            s.enqueue(c);
        }
        let order: Vec<String> = std::iter::from_fn(|| s.dequeue())
            .map(|c| c.message().to_string())
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
        assert_eq!(s.stats().queued, 3);
        assert_eq!(s.stats().max_queue_len, 3);
    }

    #[test]
    fn abort_releases_everything() {
        let mut s = Scheduler::new();
        s.begin();
        let a = s.create("a".into(), op());
        s.push(Rc::clone(&a));
        let q = s.create("q".into(), op());
        s.enqueue(q);

        assert_eq!(s.abort(), 1);
        assert!(!s.is_busy());
        assert_eq!(s.queue_len(), 0);
        assert!(s.create("b".into(), op()).cause().is_none());
        assert!(s.finish().is_none());
        assert_eq!(s.stats().discarded, 1);
    }

    #[test]
    fn halt_discards_and_blocks_until_finish() {
        let mut s = Scheduler::new();
        s.begin();
        let a = s.create("a".into(), op());
        s.push(Rc::clone(&a));
        for _ in 0..2 {
            let c = s.create("q".into(), op());
            s.enqueue(c);
        }

        assert_eq!(s.halt(1, "1 : q".into()), 2);
        assert!(s.is_halted());
        assert!(s.dequeue().is_none());
        assert_eq!(s.queue_len(), 0);
        assert!(s.halted_error().unwrap().is_recursion_limit());

        let err = s.finish().unwrap();
        assert!(err.is_recursion_limit());
        assert!(!s.is_busy());
        assert!(!s.is_halted());
        assert!(s.finish().is_none());
        assert_eq!(s.stats().discarded, 2);
    }
}
