//! Session stores - Where variables and path history survive between plays
//!
//! `InMemorySessionStore` keeps everything for the life of the process;
//! `JsonFileSessionStore` keeps one JSON document per story on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::application::ports::outbound::{SessionError, SessionState, SessionStorePort};
use crate::domain::value_objects::{internal, NarrativeElementId, PathHistory, StoryId};

type Variables = BTreeMap<String, Value>;

/// Write `value` unless it is already stored; reports whether it changed
fn put(variables: &mut Variables, name: &str, value: Value) -> bool {
    if variables.get(name) == Some(&value) {
        return false;
    }
    variables.insert(name.to_string(), value);
    true
}

fn stored_history(variables: &Variables) -> PathHistory {
    variables
        .get(internal::PATH_HISTORY)
        .map(PathHistory::from_value)
        .unwrap_or_default()
}

fn push_history(variables: &mut Variables, id: &NarrativeElementId) {
    let mut history = stored_history(variables);
    history.push(id.clone());
    variables.insert(internal::PATH_HISTORY.to_string(), history.to_value());
}

pub struct InMemorySessionStore {
    state: RwLock<SessionState>,
    variables: RwLock<Variables>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_state(SessionState::New, BTreeMap::new())
    }

    /// A store that already holds a session
    pub fn with_state(state: SessionState, variables: Variables) -> Self {
        Self {
            state: RwLock::new(state),
            variables: RwLock::new(variables),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorePort for InMemorySessionStore {
    async fn session_state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn set_session_state(&self, state: SessionState) -> Result<(), SessionError> {
        *self.state.write().await = state;
        Ok(())
    }

    async fn fetch_state(&self) -> Result<Variables, SessionError> {
        Ok(self.variables.read().await.clone())
    }

    async fn set_variable(&self, name: &str, value: Value) -> Result<(), SessionError> {
        put(&mut *self.variables.write().await, name, value);
        Ok(())
    }

    async fn set_default_state(&self, defaults: &Variables) -> Result<(), SessionError> {
        let mut variables = self.variables.write().await;
        for (name, value) in defaults {
            put(&mut variables, name, value.clone());
        }
        Ok(())
    }

    async fn fetch_path_history(&self) -> Result<Option<PathHistory>, SessionError> {
        let history = stored_history(&*self.variables.read().await);
        Ok((!history.is_empty()).then_some(history))
    }

    async fn append_to_history(&self, id: &NarrativeElementId) -> Result<(), SessionError> {
        push_history(&mut *self.variables.write().await, id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.variables.write().await.clear();
        Ok(())
    }
}

/// One `<story id>.json` file per story under a session directory
pub struct JsonFileSessionStore {
    path: PathBuf,
    state: RwLock<SessionState>,
    /// Serialises read-modify-write cycles on the file
    file_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    /// Open the session for `story_id`. A stored, non-empty session puts the
    /// store in the `Existing` state.
    pub async fn open(dir: impl AsRef<Path>, story_id: &StoryId) -> Result<Self, SessionError> {
        let store = Self {
            path: dir.as_ref().join(format!("{story_id}.json")),
            state: RwLock::new(SessionState::New),
            file_lock: Mutex::new(()),
        };
        if !store.load().await?.is_empty() {
            info!(path = %store.path.display(), "Existing session found");
            *store.state.write().await = SessionState::Existing;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Variables, SessionError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(SessionError::Storage(e.to_string())),
        };
        serde_json::from_str(&raw).map_err(|e| SessionError::Serialization(e.to_string()))
    }

    async fn save(&self, variables: &Variables) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Storage(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(variables)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        debug!(path = %self.path.display(), variables = variables.len(), "Session saved");
        Ok(())
    }

    async fn update<F>(&self, change: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Variables) -> bool + Send,
    {
        let _guard = self.file_lock.lock().await;
        let mut variables = self.load().await?;
        if change(&mut variables) {
            self.save(&variables).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStorePort for JsonFileSessionStore {
    async fn session_state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn set_session_state(&self, state: SessionState) -> Result<(), SessionError> {
        *self.state.write().await = state;
        Ok(())
    }

    async fn fetch_state(&self) -> Result<Variables, SessionError> {
        let _guard = self.file_lock.lock().await;
        self.load().await
    }

    async fn set_variable(&self, name: &str, value: Value) -> Result<(), SessionError> {
        self.update(|variables| put(variables, name, value)).await
    }

    async fn set_default_state(&self, defaults: &Variables) -> Result<(), SessionError> {
        self.update(|variables| {
            defaults
                .iter()
                .fold(false, |changed, (name, value)| put(variables, name, value.clone()) || changed)
        })
        .await
    }

    async fn fetch_path_history(&self) -> Result<Option<PathHistory>, SessionError> {
        let history = stored_history(&self.fetch_state().await?);
        Ok((!history.is_empty()).then_some(history))
    }

    async fn append_to_history(&self, id: &NarrativeElementId) -> Result<(), SessionError> {
        self.update(|variables| {
            push_history(variables, id);
            true
        })
        .await
    }

    async fn clear(&self) -> Result<(), SessionError> {
        let _guard = self.file_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("narrative-player-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_in_memory_history_round_trip() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.fetch_path_history().await.unwrap(), None);

        store.append_to_history(&"a".into()).await.unwrap();
        store.append_to_history(&"b".into()).await.unwrap();

        let history = store.fetch_path_history().await.unwrap().expect("history");
        assert_eq!(history.last(), Some(&NarrativeElementId::from("b")));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_defaults_do_not_clobber_unchanged_values() {
        let mut stored = BTreeMap::new();
        stored.insert("brave".to_string(), json!(true));
        let store = InMemorySessionStore::with_state(SessionState::Resume, stored);

        let mut defaults = BTreeMap::new();
        defaults.insert("brave".to_string(), json!(false));
        defaults.insert("level".to_string(), json!(1));
        store.set_default_state(&defaults).await.unwrap();

        assert_eq!(store.fetch_state().await.unwrap(), defaults);
        assert_eq!(store.session_state().await, SessionState::Resume);
    }

    #[tokio::test]
    async fn test_file_store_reopens_as_existing() {
        let dir = scratch_dir("reopen");
        let story_id = StoryId::from("story-1");

        let store = JsonFileSessionStore::open(&dir, &story_id).await.unwrap();
        assert_eq!(store.session_state().await, SessionState::New);
        store.set_variable("brave", json!(true)).await.unwrap();
        store.append_to_history(&"a".into()).await.unwrap();

        let reopened = JsonFileSessionStore::open(&dir, &story_id).await.unwrap();
        assert_eq!(reopened.session_state().await, SessionState::Existing);
        let state = reopened.fetch_state().await.unwrap();
        assert_eq!(state.get("brave"), Some(&json!(true)));
        assert_eq!(state.get(internal::PATH_HISTORY), Some(&json!(["a"])));

        reopened.clear().await.unwrap();
        assert!(reopened.fetch_state().await.unwrap().is_empty());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
