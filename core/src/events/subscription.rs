//! Subscription builder and handle.
//!
//! `Store::subscribe` returns a [`Subscription`]: an ordered path list
//! plus delivery options. Nothing is registered until [`Subscription::then`]
//! attaches a callback, which yields a [`SubscriptionHandle`] for muting or
//! unsubscribing later.

use std::rc::{Rc, Weak};

use serde_json::Value;

use super::registry::{Delivery, EventRegistry, ListenerFlags};
use crate::error::{StoreError, StoreResult};
use crate::store::commit::Commit;
use crate::store::runtime::Core;
use crate::tree::Path;


/// A pending subscription. Paths are absolute.
#[must_use = "a subscription does nothing until `then` attaches a callback"]
pub struct Subscription {
    core: Rc<Core>,
    paths: Vec<Path>,
    silent: bool,
    delivery: Delivery,
}

impl Subscription {
    pub(crate) fn new(core: Rc<Core>, paths: Vec<Path>) -> Self {
        Subscription {
            core,
            paths,
            silent: false,
            delivery: Delivery::Immediate,
        }
    }

    /// Skip the immediate replay of current values; only future changes
    /// are delivered.
    pub fn silently(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Alias of [`Subscription::silently`].
    pub fn silent(self) -> Self {
        self.silently()
    }

    /// Queue notifications for [`crate::Store::run_deferred`] instead of
    /// invoking the callback while the commit dispatches.
    pub fn deferred(mut self) -> Self {
        self.delivery = Delivery::Deferred;
        self
    }

    /// Append `other`'s paths so one callback receives both value lists
    /// and fires once per commit touching either. Options stay as set on
    /// `self`.
    pub fn merge(mut self, other: Subscription) -> StoreResult<Self> {
        if !Rc::ptr_eq(&self.core, &other.core) {
            return Err(StoreError::ForeignSubscription {
                this: self.core.id().to_string(),
                other: other.core.id().to_string(),
            });
        }
        self.paths.extend(other.paths);
        Ok(self)
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn event_key(&self) -> String {
        EventRegistry::event_key(&self.paths)
    }

    /// Register `callback`. Unless silenced it is called right away with
    /// the current values and a synthetic `subscribing [..]` commit.
    pub fn then<F>(self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(&[Option<Value>], &Rc<Commit>) + 'static,
    {
        let (key, listener) =
            self.core
                .subscribe(self.paths, self.delivery, self.silent, Box::new(callback));
        SubscriptionHandle {
            core: Rc::downgrade(&self.core),
            key,
            listener_id: listener.id(),
            flags: listener.flags(),
        }
    }
}


/// Returned by [`Subscription::then`]. Dropping it keeps the subscription.
pub struct SubscriptionHandle {
    core: Weak<Core>,
    key: String,
    listener_id: u64,
    flags: Rc<ListenerFlags>,
}

impl SubscriptionHandle {
    /// Stop delivery without unregistering.
    pub fn mute(&self) {
        self.flags.set_muted(true);
    }

    pub fn unmute(&self) {
        self.flags.set_muted(false);
    }

    pub fn is_muted(&self) -> bool {
        self.flags.is_muted()
    }

    pub fn is_subscribed(&self) -> bool {
        !self.flags.is_removed()
    }

    pub fn event_key(&self) -> &str {
        &self.key
    }

    /// Remove the callback from the registry. Pending deferred deliveries
    /// are dropped too. Returns false if already unsubscribed.
    pub fn unsubscribe(&self) -> bool {
        if self.flags.is_removed() {
            return false;
        }
        self.flags.mark_removed();
        match self.core.upgrade() {
            Some(core) => core.unsubscribe(&self.key, self.listener_id),
            None => true,
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("listener_id", &self.listener_id)
            .field("muted", &self.flags.is_muted())
            .field("removed", &self.flags.is_removed())
            .finish()
    }
}
