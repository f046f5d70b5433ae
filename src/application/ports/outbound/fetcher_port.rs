//! Fetcher ports - Id-keyed access to authored story content
//!
//! Every fetcher fails with `FetchError::NotFound` when the id is unknown.
//! The engine never caches what it fetches; adapters may.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entities::{
    NarrativeElement, Representation, RepresentationCollection, Story,
};
use crate::domain::value_objects::{
    NarrativeElementId, RepresentationCollectionId, RepresentationId, StoryId,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Malformed content: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

#[async_trait]
pub trait StoryFetcherPort: Send + Sync {
    async fn fetch_story(&self, id: &StoryId) -> Result<Story, FetchError>;
}

#[async_trait]
pub trait NarrativeElementFetcherPort: Send + Sync {
    async fn fetch_narrative_element(
        &self,
        id: &NarrativeElementId,
    ) -> Result<NarrativeElement, FetchError>;
}

#[async_trait]
pub trait RepresentationCollectionFetcherPort: Send + Sync {
    async fn fetch_representation_collection(
        &self,
        id: &RepresentationCollectionId,
    ) -> Result<RepresentationCollection, FetchError>;
}

#[async_trait]
pub trait RepresentationFetcherPort: Send + Sync {
    async fn fetch_representation(
        &self,
        id: &RepresentationId,
    ) -> Result<Representation, FetchError>;
}

/// The four fetchers an experience is played from
#[derive(Clone)]
pub struct ExperienceFetchers {
    pub stories: Arc<dyn StoryFetcherPort>,
    pub narrative_elements: Arc<dyn NarrativeElementFetcherPort>,
    pub representation_collections: Arc<dyn RepresentationCollectionFetcherPort>,
    pub representations: Arc<dyn RepresentationFetcherPort>,
}

impl ExperienceFetchers {
    /// Use one adapter for all four kinds of content
    pub fn from_source<S>(source: Arc<S>) -> Self
    where
        S: StoryFetcherPort
            + NarrativeElementFetcherPort
            + RepresentationCollectionFetcherPort
            + RepresentationFetcherPort
            + 'static,
    {
        Self {
            stories: source.clone(),
            narrative_elements: source.clone(),
            representation_collections: source.clone(),
            representations: source,
        }
    }
}
