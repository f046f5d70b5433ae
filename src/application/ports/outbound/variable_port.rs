//! Variable resolver port - Named, dot-addressable story variables

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    #[error("Variable store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid variable name: {0}")]
    InvalidName(String),
}

/// Async get/set of story variables.
///
/// `get` answers `Ok(None)` for a variable that has no value. Names may use
/// dots to address nested values (`player.health`).
#[async_trait]
pub trait VariableResolverPort: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Value>, VariableError>;

    async fn set(&self, name: &str, value: Value) -> Result<(), VariableError>;
}
