//! Representation entities - Playable content descriptors, opaque to reasoning
//!
//! A narrative element points at a collection of rule-gated representations;
//! the engine only chooses one, it never looks inside.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::value_objects::{
    NarrativeElementId, RepresentationCollectionId, RepresentationId, RuleExpression,
};

/// Type urn of the stand-in used when a collection has no representations
pub const PLACEHOLDER_REPRESENTATION_TYPE: &str =
    "urn:x-object-based-media:representation-types:placeholder/v1.0";

/// Rule-gated alternatives for presenting one narrative element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentationCollection {
    pub id: RepresentationCollectionId,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub representations: Vec<RepresentationChoice>,
}

impl RepresentationCollection {
    pub fn new(id: impl Into<RepresentationCollectionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: "0:0".to_string(),
            name: name.into(),
            representations: Vec::new(),
        }
    }

    pub fn with_choice(
        mut self,
        representation: impl Into<RepresentationId>,
        condition: impl Into<RuleExpression>,
    ) -> Self {
        self.representations.push(RepresentationChoice {
            representation_id: representation.into(),
            condition: condition.into(),
        });
        self
    }
}

/// One candidate entry of a representation collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentationChoice {
    pub representation_id: RepresentationId,
    #[serde(default)]
    pub condition: RuleExpression,
}

/// A playable content descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    pub id: RepresentationId,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    pub representation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Asset collections, behaviours and anything else the renderer needs
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Representation {
    pub fn new(
        id: impl Into<RepresentationId>,
        name: impl Into<String>,
        representation_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            version: "0:0".to_string(),
            name: name.into(),
            representation_type: representation_type.into(),
            description: None,
            content: Map::new(),
        }
    }

    /// Stand-in that renders an element's description
    pub fn placeholder(element_id: &NarrativeElementId, description: &str) -> Self {
        Self {
            id: RepresentationId::new(element_id.as_str()),
            version: "0:0".to_string(),
            name: "Placeholder".to_string(),
            representation_type: PLACEHOLDER_REPRESENTATION_TYPE.to_string(),
            description: Some(description.to_string()),
            content: Map::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.representation_type == PLACEHOLDER_REPRESENTATION_TYPE
    }
}
