//! Store configuration.
//!
//! Only the commit scheduler has knobs: how deep reentrant commits may
//! nest, how much of the causal chain a recursion error shows, and what
//! happens to already-queued work when the ceiling is hit. Configs are
//! plain YAML:
//!
//! ```yaml
//! max_depth: 50
//! trace_frames: 5
//! overflow: reject_offending
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StoreResult;


/// What the scheduler does when a reentrant commit reaches `max_depth`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop every queued commit, clear the call stack and fail the
    /// outermost commit as well.
    #[default]
    DiscardPending,
    /// Fail only the offending commit; queued commits still run.
    RejectOffending,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Depth at which a reentrant commit is refused.
    pub max_depth: usize,

    /// Number of `depth : message` frames in a recursion error.
    pub trace_frames: usize,

    pub overflow: OverflowPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            max_depth: 100,
            trace_frames: 10,
            overflow: OverflowPolicy::DiscardPending,
        }
    }
}

impl StoreConfig {
    /// Parse from a YAML string. Missing fields take their defaults.
    pub fn from_yaml(content: &str) -> StoreResult<StoreConfig> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load from a YAML file.
    pub fn load(path: &Path) -> StoreResult<StoreConfig> {
        let content = std::fs::read_to_string(path)?;
        StoreConfig::from_yaml(&content)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_depth, 100);
        assert_eq!(config.trace_frames, 10);
        assert_eq!(config.overflow, OverflowPolicy::DiscardPending);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
max_depth: 20
trace_frames: 3
overflow: reject_offending
"#;
        let config = StoreConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.trace_frames, 3);
        assert_eq!(config.overflow, OverflowPolicy::RejectOffending);
    }

    #[test]
    fn parse_partial_config_fills_defaults() {
        let config = StoreConfig::from_yaml("max_depth: 5\n").unwrap();
        assert_eq!(config, StoreConfig::default().with_max_depth(5));
    }

    #[test]
    fn parse_invalid_policy() {
        let err = StoreConfig::from_yaml("overflow: explode\n").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join("tree_store_config_load");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.yaml");
        std::fs::write(&path, "trace_frames: 2\noverflow: discard_pending\n").unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.trace_frames, 2);
        assert_eq!(config.max_depth, 100);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file() {
        let path = std::env::temp_dir().join("tree_store_config_missing/none.yaml");
        assert!(matches!(StoreConfig::load(&path), Err(StoreError::Io(_))));
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = StoreConfig::default().with_overflow(OverflowPolicy::RejectOffending);
        let text = serde_yaml::to_string(&config).unwrap();
        assert!(text.contains("reject_offending"));
        assert_eq!(StoreConfig::from_yaml(&text).unwrap(), config);
    }
}
