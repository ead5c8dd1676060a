//! Path-to-event index.
//!
//! Every subscription names an ordered list of paths; the paths joined
//! with `,` form its composite event key. For each individual path the
//! registry keeps a reference count per composite key, so a set of
//! changed paths maps to the composite events it reaches, each exactly
//! once, in first-reached order.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::store::commit::Commit;
use crate::tree::{self, Path};


/// Callback signature: current values at each subscribed path, in
/// subscription order, plus the commit that caused the notification.
pub type Callback = dyn FnMut(&[Option<Value>], &Rc<Commit>);

/// When a listener's callback runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Synchronously, while the triggering commit dispatches.
    #[default]
    Immediate,
    /// Later, from `Store::run_deferred`.
    Deferred,
}

#[derive(Debug, Default)]
pub(crate) struct ListenerFlags {
    muted: Cell<bool>,
    removed: Cell<bool>,
}

impl ListenerFlags {
    pub(crate) fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }

    pub(crate) fn is_muted(&self) -> bool {
        self.muted.get()
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.set(true);
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.get()
    }
}

/// A registered callback. Clones share the callback and its flags.
#[derive(Clone)]
pub struct Listener {
    id: u64,
    delivery: Delivery,
    callback: Rc<RefCell<Box<Callback>>>,
    flags: Rc<ListenerFlags>,
}

impl Listener {
    pub(crate) fn new(id: u64, delivery: Delivery, callback: Box<Callback>) -> Self {
        Listener {
            id,
            delivery,
            callback: Rc::new(RefCell::new(callback)),
            flags: Rc::new(ListenerFlags::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Neither muted nor unsubscribed.
    pub fn is_active(&self) -> bool {
        !self.flags.is_muted() && !self.flags.is_removed()
    }

    pub(crate) fn flags(&self) -> Rc<ListenerFlags> {
        Rc::clone(&self.flags)
    }

    /// Run the callback. Returns false if it is already running further up
    /// the call stack.
    pub(crate) fn invoke(&self, values: &[Option<Value>], commit: &Rc<Commit>) -> bool {
        match self.callback.try_borrow_mut() {
            Ok(mut callback) => {
                (&mut **callback)(values, commit);
                true
            }
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("delivery", &self.delivery)
            .field("muted", &self.flags.is_muted())
            .field("removed", &self.flags.is_removed())
            .finish()
    }
}


/// One composite event ready for delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub key: String,
    pub values: Vec<Option<Value>>,
    pub listeners: Vec<Listener>,
}

#[derive(Debug)]
struct EventEntry {
    paths: Vec<Path>,
    listeners: Vec<Listener>,
}

#[derive(Debug, Default)]
pub struct EventRegistry {
    /// path -> (composite key, reference count), in registration order
    by_path: HashMap<Path, Vec<(String, usize)>>,
    events: HashMap<String, EventEntry>,
}

impl EventRegistry {
    pub fn new() -> Self {
        EventRegistry::default()
    }

    /// Composite key for an ordered path list.
    pub fn event_key(paths: &[Path]) -> String {
        paths
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Attach `listener` to the composite event for `paths`, counting one
    /// reference per path. Returns the composite key.
    pub fn register(&mut self, paths: &[Path], listener: Listener) -> String {
        let key = EventRegistry::event_key(paths);
        self.events
            .entry(key.clone())
            .or_insert_with(|| EventEntry {
                paths: paths.to_vec(),
                listeners: Vec::new(),
            })
            .listeners
            .push(listener);

        for path in paths {
            let counts = self.by_path.entry(path.clone()).or_default();
            match counts.iter_mut().find(|(k, _)| *k == key) {
                Some((_, n)) => *n += 1,
                None => counts.push((key.clone(), 1)),
            }
        }
        key
    }

    /// Detach a listener, releasing its path references. Entries whose
    /// count drops to zero are pruned. Returns false if it was not found.
    pub fn unregister(&mut self, key: &str, listener_id: u64) -> bool {
        let Some(entry) = self.events.get_mut(key) else {
            return false;
        };
        let before = entry.listeners.len();
        entry.listeners.retain(|l| l.id != listener_id);
        if entry.listeners.len() == before {
            return false;
        }

        let paths = entry.paths.clone();
        if entry.listeners.is_empty() {
            self.events.remove(key);
        }

        for path in &paths {
            let Some(counts) = self.by_path.get_mut(path) else {
                continue;
            };
            if let Some(pos) = counts.iter().position(|(k, _)| k == key) {
                counts[pos].1 -= 1;
                if counts[pos].1 == 0 {
                    counts.remove(pos);
                }
            }
            if counts.is_empty() {
                self.by_path.remove(path);
            }
        }
        true
    }

    /// Composite keys reached by any of `changed`, deduplicated.
    pub fn events_for(&self, changed: &[Path]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for path in changed {
            let Some(counts) = self.by_path.get(path) else {
                continue;
            };
            for (key, _) in counts {
                if seen.insert(key.as_str()) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }

    /// Fan `changed` out into notifications, reading each composite's
    /// values from `state`.
    pub fn notifications(&self, changed: &[Path], state: &Value) -> Vec<Notification> {
        self.events_for(changed)
            .into_iter()
            .filter_map(|key| {
                let entry = self.events.get(&key)?;
                let values = entry
                    .paths
                    .iter()
                    .map(|p| tree::get(state, p).cloned())
                    .collect();
                Some(Notification {
                    values,
                    listeners: entry.listeners.clone(),
                    key,
                })
            })
            .collect()
    }

    pub fn ref_count(&self, path: &Path, key: &str) -> usize {
        self.by_path
            .get(path)
            .and_then(|counts| counts.iter().find(|(k, _)| k == key))
            .map_or(0, |(_, n)| *n)
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.events.get(key).map_or(0, |e| e.listeners.len())
    }

    /// Number of distinct composite events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
