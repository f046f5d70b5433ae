//! In-memory variable store over a single JSON object
//!
//! Names are dotted paths into the object. Reading `_random_number` yields a
//! fresh value in `[0, 100)` every time.

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::application::ports::outbound::{VariableError, VariableResolverPort};
use crate::domain::value_objects::internal;

pub struct ObjectDataResolver {
    data: RwLock<Value>,
}

impl ObjectDataResolver {
    /// Resolve over `data`; anything but an object starts empty
    pub fn new(data: Value) -> Self {
        let data = match data {
            Value::Object(_) => data,
            _ => Value::Object(Map::new()),
        };
        Self {
            data: RwLock::new(data),
        }
    }

    /// A copy of everything stored
    pub async fn snapshot(&self) -> Value {
        self.data.read().await.clone()
    }
}

impl Default for ObjectDataResolver {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

fn segments(name: &str) -> Result<Vec<&str>, VariableError> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(VariableError::InvalidName(name.to_string()));
    }
    Ok(parts)
}

/// The object at `node`, replacing any scalar found there
fn as_object(node: &mut Value) -> Option<&mut Map<String, Value>> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
}

#[async_trait]
impl VariableResolverPort for ObjectDataResolver {
    async fn get(&self, name: &str) -> Result<Option<Value>, VariableError> {
        if name == internal::RANDOM {
            let roll: f64 = rand::thread_rng().gen_range(0.0..100.0);
            return Ok(Some(Value::from(roll)));
        }

        let parts = segments(name)?;
        let data = self.data.read().await;
        let found = parts
            .iter()
            .try_fold(&*data, |node, key| node.as_object().and_then(|map| map.get(*key)));
        Ok(found.filter(|value| !value.is_null()).cloned())
    }

    async fn set(&self, name: &str, value: Value) -> Result<(), VariableError> {
        let parts = segments(name)?;
        let Some((last, parents)) = parts.split_last() else {
            return Err(VariableError::InvalidName(name.to_string()));
        };

        let mut data = self.data.write().await;
        let mut node = &mut *data;
        let invalid = || VariableError::InvalidName(name.to_string());
        for key in parents {
            node = as_object(node)
                .ok_or_else(invalid)?
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        as_object(node).ok_or_else(invalid)?.insert(last.to_string(), value);
        Ok(())
    }
}
