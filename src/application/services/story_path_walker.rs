//! Story Path Walker - Detects stories that can only ever play one way
//!
//! The walker plays a story to its end with a private reasoner. The story is
//! linear when no step ever offers a choice of beginnings or links and no
//! element is visited twice; the elements played, in order, are its path.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::application::ports::outbound::{ExperienceFetchers, FetchError};
use crate::application::services::{ReasonerFactory, RepresentationSelector};
use crate::domain::entities::{NarrativeElement, Representation, RepresentationCollection};
use crate::domain::events::ReasonerEvent;
use crate::domain::value_objects::{NarrativeElementId, StoryId};

/// One element of a linear path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryPathItem {
    /// Stories from the top level down to the one owning the element
    pub stories: Vec<StoryId>,
    pub narrative_element: NarrativeElement,
    pub representation_collection: Option<RepresentationCollection>,
    /// Filled in by [`StoryPath::story_item_list`]
    pub representation: Option<Representation>,
}

/// Result of a linearity walk
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StoryPath {
    Linear(Vec<StoryPathItem>),
    #[default]
    NonLinear,
}

impl StoryPath {
    pub fn is_linear(&self) -> bool {
        matches!(self, Self::Linear(_))
    }

    /// Path items; empty for non-linear stories
    pub fn items(&self) -> &[StoryPathItem] {
        match self {
            Self::Linear(items) => items,
            Self::NonLinear => &[],
        }
    }

    pub fn elements(&self) -> Vec<NarrativeElement> {
        self.items()
            .iter()
            .map(|item| item.narrative_element.clone())
            .collect()
    }

    fn position(&self, id: &NarrativeElementId) -> Option<usize> {
        self.items()
            .iter()
            .position(|item| &item.narrative_element.id == id)
    }

    /// The element played before `id` on the path
    pub fn previous_of(&self, id: &NarrativeElementId) -> Option<&NarrativeElementId> {
        let index = self.position(id)?.checked_sub(1)?;
        self.items().get(index).map(|item| &item.narrative_element.id)
    }

    /// The element played after `id` on the path
    pub fn next_of(&self, id: &NarrativeElementId) -> Option<&NarrativeElementId> {
        let index = self.position(id)? + 1;
        self.items().get(index).map(|item| &item.narrative_element.id)
    }

    /// Resolve the representation of every path item
    pub async fn story_item_list(
        &self,
        selector: &RepresentationSelector,
    ) -> Result<Vec<StoryPathItem>, FetchError> {
        let mut resolved = Vec::with_capacity(self.items().len());
        for item in self.items() {
            let mut item = item.clone();
            item.representation = selector.for_element(&item.narrative_element).await?;
            resolved.push(item);
        }
        Ok(resolved)
    }
}

pub struct StoryPathWalker {
    factory: Arc<dyn ReasonerFactory>,
    fetchers: ExperienceFetchers,
    max_steps: usize,
}

impl StoryPathWalker {
    pub fn new(factory: Arc<dyn ReasonerFactory>, fetchers: ExperienceFetchers, max_steps: usize) -> Self {
        Self {
            factory,
            fetchers,
            max_steps,
        }
    }

    /// Walk `story_id` to its end. Reasoning errors and walks longer than
    /// the step limit count as non-linear.
    #[instrument(skip(self))]
    pub async fn parse_story(&self, story_id: &StoryId) -> Result<StoryPath, FetchError> {
        let mut reasoner = self.factory.build(story_id).await?;
        let mut path: Vec<(Vec<StoryId>, NarrativeElement)> = Vec::new();

        let mut step = reasoner.start().await;
        for _ in 0..=self.max_steps {
            let events = match step {
                Ok(events) => events,
                Err(fault) => {
                    warn!(error = %fault, "Linearity walk stopped");
                    return Ok(StoryPath::NonLinear);
                }
            };

            let mut ended = false;
            for event in events {
                match event {
                    ReasonerEvent::ChoiceOfBeginnings(_) | ReasonerEvent::ChoiceOfLinks(_) => {
                        info!(story_id = %story_id, "Story offers choices; not linear");
                        return Ok(StoryPath::NonLinear);
                    }
                    ReasonerEvent::Error(e) => {
                        warn!(story_id = %story_id, error = %e, "Linearity walk hit an error");
                        return Ok(StoryPath::NonLinear);
                    }
                    ReasonerEvent::NarrativeElementChanged(element) => {
                        if path.iter().any(|(_, seen)| seen.id == element.id) {
                            info!(element_id = %element.id, "Linearity walk revisited an element; not linear");
                            return Ok(StoryPath::NonLinear);
                        }
                        path.push((reasoner.active_stories(), element));
                    }
                    ReasonerEvent::StoryEnd => ended = true,
                }
            }

            if ended {
                return self.collect(path).await.map(StoryPath::Linear);
            }
            step = reasoner.next().await;
        }

        warn!(story_id = %story_id, max_steps = self.max_steps, "Linearity walk exceeded step limit");
        Ok(StoryPath::NonLinear)
    }

    async fn collect(
        &self,
        path: Vec<(Vec<StoryId>, NarrativeElement)>,
    ) -> Result<Vec<StoryPathItem>, FetchError> {
        let mut items = Vec::with_capacity(path.len());
        for (stories, element) in path {
            let representation_collection = match element.representation_collection_id() {
                Some(id) => Some(
                    self.fetchers
                        .representation_collections
                        .fetch_representation_collection(id)
                        .await?,
                ),
                None => None,
            };
            items.push(StoryPathItem {
                stories,
                narrative_element: element,
                representation_collection,
                representation: None,
            });
        }
        Ok(items)
    }
}
