//! The store façade.
//!
//! A [`Store`] is either the root of a tree or a view onto a path inside
//! one. Views hold no state: every operation rewrites its relative
//! arguments against the view's base path and forwards to the shared core.
//!
//! ```
//! use tree_store::Store;
//! use serde_json::json;
//!
//! let store = Store::new("app", json!({"user": {"name": "kim"}}));
//! let user = store.path("user");
//! user.commit("rename", json!({"name": "lee"})).unwrap();
//! assert_eq!(store.get("user.name"), Some(json!("lee")));
//! ```

pub mod commit;
pub mod registry;
pub(crate) mod runtime;
pub(crate) mod scheduler;

pub use commit::{Commit, CommitMode, Operation};
pub use registry::StoreRegistry;
pub use scheduler::SchedulerStats;

use std::rc::Rc;

use serde_json::Value;

use self::runtime::Core;
use crate::config::StoreConfig;
use crate::diff::Patch;
use crate::error::{StoreError, StoreResult};
use crate::events::Subscription;
use crate::tree::{IntoPath, Path};


/// Which part of the tree a handle addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The whole tree.
    Root,
    /// The subtree at an absolute path.
    View(Path),
}

/// Handle to a store or one of its sub-stores. Clones share everything.
#[derive(Debug, Clone)]
pub struct Store {
    core: Rc<Core>,
    scope: Scope,
}

impl Store {
    /// Create a root store with the default configuration. Ids are not
    /// checked for uniqueness here; use [`StoreRegistry`] for that.
    pub fn new(id: impl Into<String>, initial: Value) -> Store {
        Store::with_config(id, initial, StoreConfig::default())
    }

    pub fn with_config(id: impl Into<String>, initial: Value, config: StoreConfig) -> Store {
        Store {
            core: Rc::new(Core::new(id.into(), initial, config)),
            scope: Scope::Root,
        }
    }

    pub fn id(&self) -> &str {
        self.core.id()
    }

    pub fn config(&self) -> &StoreConfig {
        self.core.config()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn is_sub_store(&self) -> bool {
        matches!(self.scope, Scope::View(_))
    }

    /// Absolute path this handle is rooted at.
    pub fn base_path(&self) -> Path {
        match &self.scope {
            Scope::Root => Path::root(),
            Scope::View(base) => base.clone(),
        }
    }

    /// True if both handles share one tree.
    pub fn same_tree(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// Sub-store at `path`, relative to this handle.
    pub fn path(&self, path: impl IntoPath) -> Store {
        Store {
            core: Rc::clone(&self.core),
            scope: Scope::View(self.absolute(path)),
        }
    }

    fn absolute(&self, path: impl IntoPath) -> Path {
        self.base_path().path(path)
    }

    // --- Reads ---

    /// Current value at `path`, relative to this handle.
    pub fn get(&self, path: impl IntoPath) -> Option<Value> {
        self.core.get(&self.absolute(path))
    }

    /// Copy of the whole tree, whatever this handle's scope.
    pub fn snapshot(&self) -> Value {
        self.core.get(&Path::root()).unwrap_or(Value::Null)
    }

    // --- Writes ---

    /// Merge `patch` into the subtree at this handle's base.
    pub fn commit(&self, message: impl Into<String>, patch: impl Into<Patch>) -> StoreResult<()> {
        let patch = patch.into();
        let base = self.base_path();
        if base.is_root() && patch.is_delete() {
            return Err(StoreError::RootPath { operation: "delete" });
        }
        let patch = patch.normalized().wrap(&base);
        self.core.submit(message.into(), Operation::Merge(patch))
    }

    /// Compute the patch from the current value at this handle's base,
    /// then commit it.
    pub fn commit_with<F, P>(&self, message: impl Into<String>, update: F) -> StoreResult<()>
    where
        F: FnOnce(Option<&Value>) -> P,
        P: Into<Patch>,
    {
        let current = self.get("");
        let patch = update(current.as_ref());
        self.commit(message, patch)
    }

    /// Replace the subtree at this handle's base with `value`.
    pub fn reset(&self, message: impl Into<String>, value: Value) -> StoreResult<()> {
        self.reset_at(message, value, "")
    }

    /// Replace the subtree at `path` (relative to this handle) with `value`.
    pub fn reset_at(
        &self,
        message: impl Into<String>,
        value: Value,
        path: impl IntoPath,
    ) -> StoreResult<()> {
        let base = self.absolute(path);
        self.core
            .submit(message.into(), Operation::Replace { value, base })
    }

    // --- Subscriptions ---

    /// Subscribe to one or more paths relative to this handle. An empty
    /// list subscribes to the handle's base itself.
    pub fn subscribe<I, P>(&self, paths: I) -> Subscription
    where
        I: IntoIterator<Item = P>,
        P: IntoPath,
    {
        let mut absolute: Vec<Path> = paths.into_iter().map(|p| self.absolute(p)).collect();
        if absolute.is_empty() {
            absolute.push(self.base_path());
        }
        Subscription::new(Rc::clone(&self.core), absolute)
    }

    /// Deliver notifications queued for deferred subscriptions. Returns
    /// how many callbacks ran.
    pub fn run_deferred(&self) -> usize {
        self.core.run_deferred()
    }

    pub fn pending_deferred(&self) -> usize {
        self.core.pending_deferred()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.core.stats()
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
