//! Explicit registry of root stores, keyed by id.
//!
//! Whatever composes the application owns one of these and creates its
//! stores through it; duplicate ids are refused at creation.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::Store;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};


#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Store>,
    config: StoreConfig,
}

impl StoreRegistry {
    pub fn new() -> Self {
        StoreRegistry::default()
    }

    /// Registry whose stores all use `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        StoreRegistry {
            stores: BTreeMap::new(),
            config,
        }
    }

    /// Create and register a root store. An empty id is replaced by
    /// `store<N>`, N being the number of stores registered so far.
    pub fn create(&mut self, id: &str, initial: Value) -> StoreResult<Store> {
        let id = if id.is_empty() {
            format!("store{}", self.stores.len())
        } else {
            id.to_string()
        };
        if self.stores.contains_key(&id) {
            return Err(StoreError::DuplicateStoreId { id });
        }

        let store = Store::with_config(id.clone(), initial, self.config.clone());
        self.stores.insert(id.clone(), store.clone());
        debug!(store = %id, "store registered");
        Ok(store)
    }

    pub fn get(&self, id: &str) -> Option<Store> {
        self.stores.get(id).cloned()
    }

    /// Forget a store. Existing handles keep working.
    pub fn remove(&mut self, id: &str) -> Option<Store> {
        self.stores.remove(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
