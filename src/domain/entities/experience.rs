//! Experience - Every object an authored story needs, in one document

use serde::{Deserialize, Serialize};

use super::{NarrativeElement, Representation, RepresentationCollection, Story};

/// The full authored content of a playable experience
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default)]
    pub stories: Vec<Story>,
    #[serde(default)]
    pub narrative_elements: Vec<NarrativeElement>,
    #[serde(default)]
    pub representation_collections: Vec<RepresentationCollection>,
    #[serde(default)]
    pub representations: Vec<Representation>,
}

impl Experience {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_story(mut self, story: Story) -> Self {
        self.stories.push(story);
        self
    }

    pub fn with_element(mut self, element: NarrativeElement) -> Self {
        self.narrative_elements.push(element);
        self
    }

    pub fn with_collection(mut self, collection: RepresentationCollection) -> Self {
        self.representation_collections.push(collection);
        self
    }

    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representations.push(representation);
        self
    }
}
