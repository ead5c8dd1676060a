//! tree-store: an observable in-memory tree.
//!
//! Callers submit merge patches (`commit`) or authoritative subtree
//! replacements (`reset`) against a single `serde_json::Value` tree, and
//! subscribe to one or more paths in it. Each subscription is notified once
//! per effective change with the current values at its paths and the
//! [`Commit`] that caused it. Commits issued from inside a notification
//! are queued and run after the current one, linked to it through
//! [`Commit::cause`].
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::{json, Value};
//! use tree_store::{Commit, Store};
//!
//! let store = Store::new("demo", json!({"count": 0}));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! store
//!     .subscribe(["count"])
//!     .silently()
//!     .then(move |values: &[Option<Value>], _: &Rc<Commit>| sink.borrow_mut().push(values[0].clone()));
//!
//! store.commit("bump", json!({"count": 1})).unwrap();
//! store.commit("same again", json!({"count": 1})).unwrap();
//! assert_eq!(*seen.borrow(), vec![Some(json!(1))]);
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod store;
pub mod tree;

pub use config::{OverflowPolicy, StoreConfig};
pub use diff::{Change, Diff, DiffResult, Patch};
pub use error::{StoreError, StoreResult};
pub use events::{Delivery, Subscription, SubscriptionHandle};
pub use store::{Commit, CommitMode, Operation, SchedulerStats, Scope, Store, StoreRegistry};
pub use tree::{navigate, navigate_mut, IntoPath, Path, Segment};
