//! Story entity - A graph of narrative elements with rule-gated entry points

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::value_objects::{NarrativeElementId, RuleExpression, StoryId};

/// A story: the unit a reasoner walks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    /// Candidate entry points, in authored order
    #[serde(default)]
    pub beginnings: Vec<Beginning>,
    /// Every narrative element belonging to this story level
    #[serde(default)]
    pub narrative_element_ids: Vec<NarrativeElementId>,
    /// Declared variables with their defaults
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDeclaration>,
}

impl Story {
    pub fn new(id: impl Into<StoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: "0:0".to_string(),
            name: name.into(),
            beginnings: Vec::new(),
            narrative_element_ids: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_beginning(
        mut self,
        target: impl Into<NarrativeElementId>,
        condition: impl Into<RuleExpression>,
    ) -> Self {
        self.beginnings.push(Beginning {
            narrative_element_id: target.into(),
            condition: condition.into(),
        });
        self
    }

    pub fn with_element(mut self, id: impl Into<NarrativeElementId>) -> Self {
        self.narrative_element_ids.push(id.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, declaration: VariableDeclaration) -> Self {
        self.variables.insert(name.into(), declaration);
        self
    }

    /// A story without beginnings can never be entered
    pub fn is_enterable(&self) -> bool {
        !self.beginnings.is_empty()
    }

    pub fn contains(&self, id: &NarrativeElementId) -> bool {
        self.narrative_element_ids.contains(id)
    }
}

/// A rule-gated entry point into a story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beginning {
    pub narrative_element_id: NarrativeElementId,
    #[serde(default)]
    pub condition: RuleExpression,
}

/// Declared type of a story variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Boolean,
    Number,
    List,
    String,
}

/// Open interval for number variables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableRange {
    pub min_val: f64,
    pub max_val: f64,
}

/// Declaration of a story variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub variable_type: VariableType,
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<VariableRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl VariableDeclaration {
    pub fn new(variable_type: VariableType, default_value: Value) -> Self {
        Self {
            variable_type,
            default_value,
            description: String::new(),
            range: None,
            values: Vec::new(),
        }
    }

    pub fn with_range(mut self, min_val: f64, max_val: f64) -> Self {
        self.range = Some(VariableRange { min_val, max_val });
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Parse an externally supplied textual value against this declaration.
    ///
    /// Returns `None` when the text is not a valid value: booleans must be
    /// `true`/`false` (any case), numbers must fall strictly inside the
    /// declared range, list values must be one of the declared values.
    pub fn parse_override(&self, raw: &str) -> Option<Value> {
        match self.variable_type {
            VariableType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            VariableType::Number => {
                let number: f64 = raw.trim().parse().ok()?;
                if number.is_nan() {
                    return None;
                }
                if let Some(range) = self.range {
                    if !(number > range.min_val && number < range.max_val) {
                        return None;
                    }
                }
                serde_json::Number::from_f64(number).map(Value::Number)
            }
            VariableType::List => self
                .values
                .iter()
                .any(|v| v == raw)
                .then(|| Value::String(raw.to_string())),
            VariableType::String => Some(Value::String(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_story_deserialization_uses_wire_names() {
        let story: Story = serde_json::from_value(json!({
            "id": "s1",
            "name": "Sample",
            "beginnings": [{"narrative_element_id": "ne1", "condition": {"==": [1, 1]}}],
            "narrative_element_ids": ["ne1", "ne2"],
            "variables": {
                "mood": {"variable_type": "list", "default_value": "calm", "values": ["calm", "angry"]}
            }
        }))
        .expect("story should deserialize");

        assert_eq!(story.id.as_str(), "s1");
        assert!(story.is_enterable());
        assert!(story.contains(&"ne2".into()));
        assert_eq!(story.variables["mood"].variable_type, VariableType::List);
    }

    #[test]
    fn test_story_without_beginnings_is_not_enterable() {
        assert!(!Story::new("s", "Empty").is_enterable());
    }

    #[test]
    fn test_parse_override_by_type() {
        let flag = VariableDeclaration::new(VariableType::Boolean, json!(false));
        assert_eq!(flag.parse_override("TRUE"), Some(json!(true)));
        assert_eq!(flag.parse_override("yes"), None);

        let level = VariableDeclaration::new(VariableType::Number, json!(1)).with_range(0.0, 10.0);
        assert_eq!(level.parse_override("5"), Some(json!(5.0)));
        assert_eq!(level.parse_override("10"), None);
        assert_eq!(level.parse_override("ten"), None);

        let mood = VariableDeclaration::new(VariableType::List, json!("calm"))
            .with_values(["calm", "angry"]);
        assert_eq!(mood.parse_override("angry"), Some(json!("angry")));
        assert_eq!(mood.parse_override("sleepy"), None);
    }
}
