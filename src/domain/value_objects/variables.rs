//! Variable snapshots and the path history

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::NarrativeElementId;

/// Reserved variable names maintained by the engine itself
pub mod internal {
    pub const DAY_OF_WEEK: &str = "_day_of_week";
    pub const PORTION_OF_DAY: &str = "_portion_of_day";
    pub const PATH_HISTORY: &str = "_path_history";
    pub const RANDOM: &str = "_random_number";

    pub const ALL: [&str; 4] = [DAY_OF_WEEK, PORTION_OF_DAY, PATH_HISTORY, RANDOM];
}

/// Nested variable state handed to the rule evaluator for one selection round
///
/// Built from dot-addressed names: `a.b.c = 1` becomes `{"a":{"b":{"c":1}}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableSnapshot(Map<String, Value>);

impl VariableSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value at a dotted path, creating intermediate objects.
    ///
    /// The first value written to a path wins; a later, deeper path under a
    /// leaf that is not an object is ignored.
    pub fn insert(&mut self, dotted_name: &str, value: Value) {
        let mut parts = dotted_name.split('.').peekable();
        let mut node = &mut self.0;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.entry(part.to_string()).or_insert(value);
                return;
            }
            let child = node
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match child {
                Value::Object(map) => node = map,
                _ => return,
            }
        }
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut snapshot = Self::new();
        for (name, value) in pairs {
            snapshot.insert(&name, value);
        }
        snapshot
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Ordered record of visited narrative elements, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathHistory(Vec<NarrativeElementId>);

impl PathHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a history out of a stored variable value; anything that is not
    /// an array of strings reads as empty.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(NarrativeElementId::from)
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|id| Value::String(id.to_string()))
                .collect(),
        )
    }

    pub fn push(&mut self, id: NarrativeElementId) {
        self.0.push(id);
    }

    pub fn pop(&mut self) -> Option<NarrativeElementId> {
        self.0.pop()
    }

    pub fn last(&self) -> Option<&NarrativeElementId> {
        self.0.last()
    }

    /// The element visited before the current one
    pub fn previous(&self) -> Option<&NarrativeElementId> {
        self.0.len().checked_sub(2).and_then(|i| self.0.get(i))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NarrativeElementId> {
        self.0.iter()
    }

    pub fn contains(&self, id: &NarrativeElementId) -> bool {
        self.0.contains(id)
    }
}

impl From<Vec<NarrativeElementId>> for PathHistory {
    fn from(ids: Vec<NarrativeElementId>) -> Self {
        Self(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_nests_dotted_names() {
        let snapshot = VariableSnapshot::from_pairs(vec![
            ("a.b.c".to_string(), json!(1)),
            ("a.b.d".to_string(), json!("x")),
            ("a.e".to_string(), json!(true)),
            ("top".to_string(), Value::Null),
        ]);
        assert_eq!(
            snapshot.into_value(),
            json!({"a": {"b": {"c": 1, "d": "x"}, "e": true}, "top": null})
        );
    }

    #[test]
    fn test_snapshot_first_write_wins() {
        let mut snapshot = VariableSnapshot::new();
        snapshot.insert("score", json!(3));
        snapshot.insert("score", json!(4));
        snapshot.insert("score.inner", json!(5));
        assert_eq!(snapshot.into_value(), json!({"score": 3}));
    }

    #[test]
    fn test_path_history_previous() {
        let mut history = PathHistory::new();
        assert!(history.previous().is_none());
        history.push("a".into());
        assert!(history.previous().is_none());
        history.push("b".into());
        assert_eq!(history.previous().map(|id| id.as_str()), Some("a"));
        assert_eq!(PathHistory::from_value(&history.to_value()), history);
    }

    #[test]
    fn test_path_history_iterates_newest_first_when_reversed() {
        let history = PathHistory::from(vec!["a".into(), "b".into(), "c".into()]);
        let older: Vec<&str> = history.iter().rev().skip(1).map(|id| id.as_str()).collect();
        assert_eq!(older, vec!["b", "a"]);
    }

    #[test]
    fn test_path_history_from_non_array_is_empty() {
        assert!(PathHistory::from_value(&json!({"a": 1})).is_empty());
        assert!(PathHistory::from_value(&Value::Null).is_empty());
    }
}
