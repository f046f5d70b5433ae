//! In-memory experience repository - All four fetchers over one `Experience`
//!
//! Content is indexed by id once at construction; later fetches clone out of
//! the index. Experiences are loaded from the JSON document the authoring
//! tools export.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::application::ports::outbound::{
    FetchError, NarrativeElementFetcherPort, RepresentationCollectionFetcherPort,
    RepresentationFetcherPort, StoryFetcherPort,
};
use crate::domain::entities::{
    Experience, NarrativeElement, Representation, RepresentationCollection, Story,
};
use crate::domain::value_objects::{
    NarrativeElementId, RepresentationCollectionId, RepresentationId, StoryId,
};

pub struct InMemoryExperienceRepository {
    stories: HashMap<StoryId, Story>,
    narrative_elements: HashMap<NarrativeElementId, NarrativeElement>,
    representation_collections: HashMap<RepresentationCollectionId, RepresentationCollection>,
    representations: HashMap<RepresentationId, Representation>,
    /// Story ids in document order
    story_order: Vec<StoryId>,
}

impl InMemoryExperienceRepository {
    pub fn new(experience: Experience) -> Self {
        let story_order = experience.stories.iter().map(|s| s.id.clone()).collect();
        Self {
            stories: experience.stories.into_iter().map(|s| (s.id.clone(), s)).collect(),
            narrative_elements: experience
                .narrative_elements
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
            representation_collections: experience
                .representation_collections
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            representations: experience
                .representations
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            story_order,
        }
    }

    /// Load an experience document from disk
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read experience {}", path.display()))?;
        let experience: Experience = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse experience {}", path.display()))?;

        info!(
            path = %path.display(),
            stories = experience.stories.len(),
            narrative_elements = experience.narrative_elements.len(),
            representations = experience.representations.len(),
            "Experience loaded"
        );
        Ok(Self::new(experience))
    }

    /// The first story of the document, usually the top-level one
    pub fn first_story_id(&self) -> Option<&StoryId> {
        self.story_order.first()
    }
}

fn found<T: Clone>(item: Option<&T>, kind: &'static str, id: impl std::fmt::Display) -> Result<T, FetchError> {
    match item {
        Some(item) => Ok(item.clone()),
        None => {
            debug!(kind, id = %id, "Fetch missed");
            Err(FetchError::not_found(kind, id))
        }
    }
}

#[async_trait]
impl StoryFetcherPort for InMemoryExperienceRepository {
    async fn fetch_story(&self, id: &StoryId) -> Result<Story, FetchError> {
        found(self.stories.get(id), "story", id)
    }
}

#[async_trait]
impl NarrativeElementFetcherPort for InMemoryExperienceRepository {
    async fn fetch_narrative_element(
        &self,
        id: &NarrativeElementId,
    ) -> Result<NarrativeElement, FetchError> {
        found(self.narrative_elements.get(id), "narrative element", id)
    }
}

#[async_trait]
impl RepresentationCollectionFetcherPort for InMemoryExperienceRepository {
    async fn fetch_representation_collection(
        &self,
        id: &RepresentationCollectionId,
    ) -> Result<RepresentationCollection, FetchError> {
        found(
            self.representation_collections.get(id),
            "representation collection",
            id,
        )
    }
}

#[async_trait]
impl RepresentationFetcherPort for InMemoryExperienceRepository {
    async fn fetch_representation(
        &self,
        id: &RepresentationId,
    ) -> Result<Representation, FetchError> {
        found(self.representations.get(id), "representation", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> serde_json::Value {
        json!({
            "stories": [{
                "id": "top",
                "name": "Top",
                "beginnings": [{"narrative_element_id": "a", "condition": true}],
                "narrative_element_ids": ["a"],
                "variables": {
                    "brave": {"variable_type": "boolean", "default_value": false}
                }
            }],
            "narrative_elements": [{
                "id": "a",
                "name": "A",
                "body": {
                    "type": "REPRESENTATION_COLLECTION_ELEMENT",
                    "representation_collection_target_id": "rc-a"
                },
                "links": [{"link_type": "END_STORY", "condition": true}]
            }],
            "representation_collections": [{
                "id": "rc-a",
                "representations": [{"representation_id": "rep-a", "condition": true}]
            }],
            "representations": [{
                "id": "rep-a",
                "name": "Intro",
                "representation_type": "urn:x-object-based-media:representation-types:simple-av/v1.0",
                "asset_collections": {"foreground_id": "ac-1"}
            }]
        })
    }

    #[tokio::test]
    async fn test_fetches_from_loaded_document() {
        let experience: Experience = serde_json::from_value(document()).expect("parse");
        let repository = InMemoryExperienceRepository::new(experience);

        assert_eq!(repository.first_story_id(), Some(&StoryId::from("top")));
        let story = repository.fetch_story(&"top".into()).await.expect("story");
        assert!(story.variables.contains_key("brave"));
        let element = repository.fetch_narrative_element(&"a".into()).await.expect("element");
        assert_eq!(element.representation_collection_id().map(|id| id.as_str()), Some("rc-a"));
        let representation = repository.fetch_representation(&"rep-a".into()).await.expect("rep");
        assert_eq!(representation.content.get("asset_collections"), Some(&json!({"foreground_id": "ac-1"})));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let repository = InMemoryExperienceRepository::new(Experience::new());

        assert_eq!(
            repository.fetch_story(&"nope".into()).await.unwrap_err(),
            FetchError::not_found("story", "nope")
        );
        assert!(matches!(
            repository.fetch_representation_collection(&"rc".into()).await,
            Err(FetchError::NotFound { kind: "representation collection", .. })
        ));
    }

    #[tokio::test]
    async fn test_from_file_reports_missing_file() {
        let result = InMemoryExperienceRepository::from_file("/nonexistent/experience.json").await;
        let message = format!("{:#}", result.err().expect("missing file must fail"));
        assert!(message.contains("Failed to read experience"));
    }
}
