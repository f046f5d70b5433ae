//! Story Reasoner Factory - Builds ready-to-start reasoners keyed by story id

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::{debug, instrument};

use crate::application::ports::outbound::{ExperienceFetchers, FetchError};
use crate::application::services::{ConditionEvaluator, StoryReasoner};
use crate::domain::value_objects::StoryId;

/// Builds reasoners for sub-stories, shadow walks and primary play
#[async_trait]
pub trait ReasonerFactory: Send + Sync {
    async fn build(&self, story_id: &StoryId) -> Result<StoryReasoner, FetchError>;
}

/// Default factory: fetches the story, then all of its elements
pub struct StoryReasonerFactory {
    fetchers: ExperienceFetchers,
    evaluator: ConditionEvaluator,
    this: Weak<StoryReasonerFactory>,
}

impl StoryReasonerFactory {
    pub fn new(fetchers: ExperienceFetchers, evaluator: ConditionEvaluator) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            fetchers,
            evaluator,
            this: this.clone(),
        })
    }
}

#[async_trait]
impl ReasonerFactory for StoryReasonerFactory {
    #[instrument(skip(self))]
    async fn build(&self, story_id: &StoryId) -> Result<StoryReasoner, FetchError> {
        let factory: Arc<dyn ReasonerFactory> = self
            .this
            .upgrade()
            .ok_or_else(|| FetchError::Storage("reasoner factory has been dropped".to_string()))?;

        let story = self.fetchers.stories.fetch_story(story_id).await?;
        let elements = try_join_all(
            story
                .narrative_element_ids
                .iter()
                .map(|id| self.fetchers.narrative_elements.fetch_narrative_element(id)),
        )
        .await?;

        debug!(story_id = %story_id, elements = elements.len(), "Built story reasoner");
        Ok(StoryReasoner::new(
            story,
            elements,
            self.evaluator.clone(),
            factory,
        ))
    }
}
