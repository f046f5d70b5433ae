//! Session store port - Persisted variable state between plays
//!
//! The store is a flat name -> value map per story, including the reserved
//! path-history variable. The engine only needs to read the history and
//! append to it; the rest supports resuming.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::value_objects::{NarrativeElementId, PathHistory};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Where a session stands relative to stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Pick up where the stored history left off
    Resume,
    /// Start over, ignoring stored state
    Restart,
    /// No stored state
    #[default]
    New,
    /// Stored state exists; waiting for the caller to choose
    Existing,
}

#[async_trait]
pub trait SessionStorePort: Send + Sync {
    async fn session_state(&self) -> SessionState;

    async fn set_session_state(&self, state: SessionState) -> Result<(), SessionError>;

    /// The whole stored variable map
    async fn fetch_state(&self) -> Result<BTreeMap<String, Value>, SessionError>;

    async fn set_variable(&self, name: &str, value: Value) -> Result<(), SessionError>;

    /// Write every default whose stored value differs
    async fn set_default_state(&self, variables: &BTreeMap<String, Value>) -> Result<(), SessionError>;

    /// `None` when no history has been recorded yet
    async fn fetch_path_history(&self) -> Result<Option<PathHistory>, SessionError>;

    async fn append_to_history(&self, id: &NarrativeElementId) -> Result<(), SessionError>;

    /// Forget the stored session
    async fn clear(&self) -> Result<(), SessionError>;
}
