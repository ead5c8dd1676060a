//! Error types for store operations.
//!
//! Three families share one enum: usage errors (rejected before any state
//! is touched), diff computation errors (wrapped with the originating commit
//! message by [`StoreError::commit_failed`]), and recursion exhaustion raised
//! by the commit scheduler.

use thiserror::Error;

use crate::tree::Path;

/// Result alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A root store with this id is already registered.
    #[error("there is store with same ID already: {id}")]
    DuplicateStoreId { id: String },

    /// The root reference cannot be replaced or removed through a mutating set.
    #[error("cannot {operation} on object root path")]
    RootPath { operation: &'static str },

    /// Subscriptions from two different root stores cannot be merged.
    #[error("cannot merge subscription of store '{other}' into store '{this}'")]
    ForeignSubscription { this: String, other: String },

    /// A navigation step hit a scalar where a container was required.
    #[error("expected object or array at '{path}', found {found}")]
    NotAContainer { path: Path, found: &'static str },

    /// A key segment was applied to an array.
    #[error("cannot apply key '{key}' to array at '{path}'")]
    KeyOnArray { path: Path, key: String },

    /// An array write skipped past the end of the array.
    #[error("index {index} out of range for array of length {len} at '{path}'")]
    IndexOutOfRange { path: Path, index: usize, len: usize },

    /// A diff computation failed while executing a commit.
    #[error("error while commit [{message}] caused by\n{source}")]
    CommitFailed {
        message: String,
        #[source]
        source: Box<StoreError>,
    },

    /// Reentrant commits kept triggering each other past the depth ceiling.
    #[error("commit recursion exceeded depth {depth}\n{trace}")]
    RecursionLimit { depth: usize, trace: String },

    /// Configuration could not be parsed.
    #[error("invalid store config: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Annotate a diff error with the message of the commit that caused it.
    pub fn commit_failed(message: impl Into<String>, source: StoreError) -> Self {
        StoreError::CommitFailed {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// True for errors raised by the recursion guard.
    pub fn is_recursion_limit(&self) -> bool {
        matches!(self, StoreError::RecursionLimit { .. })
    }
}

/// Short type name of a JSON value, for error messages.
pub fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
