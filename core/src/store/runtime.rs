//! Shared runtime behind a root store and all of its views.
//!
//! Owns the state tree, the event registry, the scheduler and the deferred
//! delivery queue. Each lives in its own `RefCell` and no borrow is held
//! across a callback, so callbacks are free to commit, subscribe, mute or
//! unsubscribe.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::commit::{Commit, Operation};
use super::scheduler::{Scheduler, SchedulerStats};
use crate::config::{OverflowPolicy, StoreConfig};
use crate::diff::{merge, replace};
use crate::error::{StoreError, StoreResult};
use crate::events::registry::{Callback, Delivery, EventRegistry, Listener, Notification};
use crate::tree::{self, Path};


/// A notification waiting for `run_deferred`.
struct PendingDelivery {
    listener: Listener,
    values: Vec<Option<Value>>,
    commit: Rc<Commit>,
}

pub(crate) struct Core {
    id: String,
    config: StoreConfig,
    state: RefCell<Value>,
    events: RefCell<EventRegistry>,
    scheduler: RefCell<Scheduler>,
    deferred: RefCell<VecDeque<PendingDelivery>>,
    next_listener: Cell<u64>,
}

impl Core {
    pub(crate) fn new(id: String, initial: Value, config: StoreConfig) -> Self {
        Core {
            id,
            config,
            state: RefCell::new(initial),
            events: RefCell::new(EventRegistry::new()),
            scheduler: RefCell::new(Scheduler::new()),
            deferred: RefCell::new(VecDeque::new()),
            next_listener: Cell::new(0),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn get(&self, path: &Path) -> Option<Value> {
        tree::get(&self.state.borrow(), path).cloned()
    }

    pub(crate) fn stats(&self) -> SchedulerStats {
        self.scheduler.borrow().stats().clone()
    }

    pub(crate) fn pending_deferred(&self) -> usize {
        self.deferred.borrow().len()
    }

    // --- Commits ---

    /// Run `operation` now, or queue it if a commit is already dispatching.
    pub(crate) fn submit(&self, message: String, operation: Operation) -> StoreResult<()> {
        let commit = {
            let mut scheduler = self.scheduler.borrow_mut();
            if let Some(err) = scheduler.halted_error() {
                return Err(err);
            }
            let commit = scheduler.create(message, operation);
            if scheduler.is_busy() {
                if commit.depth() >= self.config.max_depth {
                    return Err(self.overflow(&mut scheduler, &commit));
                }
                scheduler.enqueue(Rc::clone(&commit));
                trace!(
                    store = %self.id,
                    message = commit.message(),
                    depth = commit.depth(),
                    pending = scheduler.queue_len(),
                    "commit queued"
                );
                return Ok(());
            }
            scheduler.begin();
            commit
        };
        self.run(commit)
    }

    /// Execute an outermost commit, then drain everything its callbacks
    /// queued, in order.
    fn run(&self, commit: Rc<Commit>) -> StoreResult<()> {
        let _release = RunGuard { core: self };
        let mut first_error = self.execute(&commit).err();

        loop {
            let next = self.scheduler.borrow_mut().dequeue();
            let Some(next) = next else { break };
            if let Err(err) = self.execute(&next) {
                warn!(store = %self.id, error = %err, "queued commit failed");
                first_error.get_or_insert(err);
            }
        }

        let halted = self.scheduler.borrow_mut().finish();
        match halted.or(first_error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn overflow(&self, scheduler: &mut Scheduler, commit: &Commit) -> StoreError {
        let depth = commit.depth();
        let trace = commit.render_trace(self.config.trace_frames);
        match self.config.overflow {
            OverflowPolicy::DiscardPending => {
                let dropped = scheduler.halt(depth, trace.clone());
                warn!(
                    store = %self.id,
                    depth,
                    dropped,
                    message = commit.message(),
                    "commit recursion limit reached, pending commits discarded"
                );
            }
            OverflowPolicy::RejectOffending => {
                scheduler.record_rejected();
                warn!(
                    store = %self.id,
                    depth,
                    message = commit.message(),
                    "commit recursion limit reached, commit rejected"
                );
            }
        }
        StoreError::RecursionLimit { depth, trace }
    }

    /// Diff, apply, and dispatch one commit.
    fn execute(&self, commit: &Rc<Commit>) -> StoreResult<()> {
        let (changed, notifications) = {
            let mut state = self.state.borrow_mut();
            let diff = match commit.operation() {
                Operation::Merge(patch) => merge(&state, patch),
                Operation::Replace { value, base } => replace(&state, value, base),
                Operation::Replay => return Ok(()),
            };
            let mut diff = diff.map_err(|e| self.failed(commit, e))?;
            let changed = std::mem::take(&mut diff.changed_paths);
            diff.apply(&mut state).map_err(|e| self.failed(commit, e))?;
            let notifications = self.events.borrow().notifications(&changed, &state);
            (changed.len(), notifications)
        };

        self.scheduler.borrow_mut().record_executed(commit.depth());
        debug!(
            store = %self.id,
            commit = commit.id(),
            message = commit.message(),
            mode = %commit.mode(),
            depth = commit.depth(),
            changed,
            events = notifications.len(),
            "commit applied"
        );

        self.dispatch(commit, notifications);
        Ok(())
    }

    fn failed(&self, commit: &Commit, err: StoreError) -> StoreError {
        self.scheduler.borrow_mut().record_failed();
        StoreError::commit_failed(commit.message(), err)
    }

    fn dispatch(&self, commit: &Rc<Commit>, notifications: Vec<Notification>) {
        self.scheduler.borrow_mut().push(Rc::clone(commit));
        'events: for notification in &notifications {
            for listener in &notification.listeners {
                if self.scheduler.borrow().is_halted() {
                    break 'events;
                }
                self.deliver(listener, &notification.values, commit);
            }
        }
        self.scheduler.borrow_mut().pop();
    }

    fn deliver(&self, listener: &Listener, values: &[Option<Value>], commit: &Rc<Commit>) {
        if !listener.is_active() {
            return;
        }
        self.scheduler.borrow_mut().record_notification();
        match listener.delivery() {
            Delivery::Immediate => {
                if !listener.invoke(values, commit) {
                    warn!(
                        store = %self.id,
                        listener = listener.id(),
                        message = commit.message(),
                        "callback already running, notification skipped"
                    );
                }
            }
            Delivery::Deferred => self.deferred.borrow_mut().push_back(PendingDelivery {
                listener: listener.clone(),
                values: values.to_vec(),
                commit: Rc::clone(commit),
            }),
        }
    }

    /// Deliver the deferred notifications queued so far. Notifications
    /// queued while this runs wait for the next call.
    pub(crate) fn run_deferred(&self) -> usize {
        let batch: Vec<PendingDelivery> = self.deferred.borrow_mut().drain(..).collect();
        let mut delivered = 0;
        for pending in batch {
            if !pending.listener.is_active() {
                continue;
            }
            if pending.listener.invoke(&pending.values, &pending.commit) {
                delivered += 1;
            } else {
                self.deferred.borrow_mut().push_back(pending);
            }
        }
        delivered
    }

    // --- Subscriptions ---

    pub(crate) fn subscribe(
        &self,
        paths: Vec<Path>,
        delivery: Delivery,
        silent: bool,
        callback: Box<Callback>,
    ) -> (String, Listener) {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        let listener = Listener::new(id, delivery, callback);
        let key = self.events.borrow_mut().register(&paths, listener.clone());
        debug!(store = %self.id, event = %key, listener = id, silent, "subscribed");

        if !silent {
            let commit = self
                .scheduler
                .borrow_mut()
                .create(format!("subscribing [{}]", key), Operation::Replay);
            let values: Vec<Option<Value>> = {
                let state = self.state.borrow();
                paths.iter().map(|p| tree::get(&state, p).cloned()).collect()
            };
            self.deliver(&listener, &values, &commit);
        }
        (key, listener)
    }

    pub(crate) fn unsubscribe(&self, key: &str, listener_id: u64) -> bool {
        let removed = self.events.borrow_mut().unregister(key, listener_id);
        if removed {
            self.deferred
                .borrow_mut()
                .retain(|pending| pending.listener.id() != listener_id);
            debug!(store = %self.id, event = %key, listener = listener_id, "unsubscribed");
        }
        removed
    }
}

/// Releases the scheduler if a run unwinds before reaching `finish`, so a
/// panicking callback cannot leave the store queueing commits forever.
struct RunGuard<'a> {
    core: &'a Core,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let Ok(mut scheduler) = self.core.scheduler.try_borrow_mut() else {
            return;
        };
        if scheduler.is_busy() {
            let dropped = scheduler.abort();
            warn!(store = %self.core.id, dropped, "commit run aborted, pending commits dropped");
        }
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("events", &self.events.borrow().len())
            .field("pending_deferred", &self.deferred.borrow().len())
            .finish()
    }
}
