//! Narrative element entity - A single step in a story graph
//!
//! Elements refer to each other by id only, so cyclic graphs need no
//! special representation.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    NarrativeElementId, RepresentationCollectionId, RuleExpression, StoryId,
};

/// A node of the story graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeElement {
    pub id: NarrativeElementId,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub body: ElementBody,
    /// Outgoing transitions in authored order
    #[serde(default)]
    pub links: Vec<Link>,
}

impl NarrativeElement {
    /// A playable leaf element
    pub fn leaf(
        id: impl Into<NarrativeElementId>,
        name: impl Into<String>,
        representation_collection: impl Into<RepresentationCollectionId>,
    ) -> Self {
        Self {
            id: id.into(),
            version: "0:0".to_string(),
            name: name.into(),
            description: String::new(),
            body: ElementBody::RepresentationCollection {
                representation_collection_target_id: representation_collection.into(),
            },
            links: Vec::new(),
        }
    }

    /// An element whose body is an entire nested story
    pub fn sub_story(
        id: impl Into<NarrativeElementId>,
        name: impl Into<String>,
        story: impl Into<StoryId>,
    ) -> Self {
        Self {
            id: id.into(),
            version: "0:0".to_string(),
            name: name.into(),
            description: String::new(),
            body: ElementBody::Story {
                story_target_id: story.into(),
            },
            links: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// The nested story this element stands for, if any
    pub fn sub_story_id(&self) -> Option<&StoryId> {
        match &self.body {
            ElementBody::Story { story_target_id } => Some(story_target_id),
            ElementBody::RepresentationCollection { .. } => None,
        }
    }

    pub fn representation_collection_id(&self) -> Option<&RepresentationCollectionId> {
        match &self.body {
            ElementBody::RepresentationCollection {
                representation_collection_target_id,
            } => Some(representation_collection_target_id),
            ElementBody::Story { .. } => None,
        }
    }

    /// Ids this element links to directly
    pub fn link_targets(&self) -> impl Iterator<Item = &NarrativeElementId> {
        self.links
            .iter()
            .filter_map(|link| link.target_narrative_element_id.as_ref())
    }
}

/// What playing an element means: content, or a whole nested story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementBody {
    #[serde(rename = "REPRESENTATION_COLLECTION_ELEMENT")]
    RepresentationCollection {
        representation_collection_target_id: RepresentationCollectionId,
    },
    #[serde(rename = "STORY_ELEMENT")]
    Story { story_target_id: StoryId },
}

/// A rule-gated transition out of an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub link_type: LinkKind,
    #[serde(default)]
    pub condition: RuleExpression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_narrative_element_id: Option<NarrativeElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_as_chosen: Option<bool>,
}

impl Link {
    pub fn new(link_type: LinkKind, condition: impl Into<RuleExpression>) -> Self {
        Self {
            link_type,
            condition: condition.into(),
            target_narrative_element_id: None,
            description: None,
            link_rank: None,
            override_as_chosen: None,
        }
    }

    pub fn to_element(
        target: impl Into<NarrativeElementId>,
        condition: impl Into<RuleExpression>,
    ) -> Self {
        Self::new(LinkKind::ToElement, condition).with_target(target)
    }

    pub fn end_story(condition: impl Into<RuleExpression>) -> Self {
        Self::new(LinkKind::EndStory, condition)
    }

    pub fn choose_beginning(condition: impl Into<RuleExpression>) -> Self {
        Self::new(LinkKind::ChooseBeginning, condition)
    }

    pub fn with_target(mut self, target: impl Into<NarrativeElementId>) -> Self {
        self.target_narrative_element_id = Some(target.into());
        self
    }
}

/// Link kinds. Unknown wire names are preserved so they can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LinkKind {
    /// Move to another element of the same story
    ToElement,
    /// Enter an element of the same story that hosts a nested story
    ToSubStory,
    /// Terminate this story level
    EndStory,
    /// Re-run beginning selection
    ChooseBeginning,
    Unrecognized(String),
}

impl LinkKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ToElement => "NARRATIVE_ELEMENT",
            Self::ToSubStory => "STORY_ELEMENT",
            Self::EndStory => "END_STORY",
            Self::ChooseBeginning => "CHOOSE_BEGINNING",
            Self::Unrecognized(other) => other.as_str(),
        }
    }
}

impl From<String> for LinkKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "NARRATIVE_ELEMENT" | "TO_ELEMENT" | "NARRATIVE_OBJECT" => Self::ToElement,
            "STORY_ELEMENT" | "SUB_STORY" => Self::ToSubStory,
            "END_STORY" => Self::EndStory,
            "CHOOSE_BEGINNING" => Self::ChooseBeginning,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<LinkKind> for String {
    fn from(kind: LinkKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
