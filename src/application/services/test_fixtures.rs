//! Shared builders for service tests

use std::sync::Arc;

use serde_json::Value;

use crate::application::ports::outbound::ExperienceFetchers;
use crate::application::services::{ConditionEvaluator, RepresentationSelector, StoryReasonerFactory};
use crate::domain::entities::{Experience, Link, NarrativeElement, RepresentationCollection};
use crate::domain::events::ReasonerEvent;
use crate::domain::value_objects::{NarrativeElementId, PathHistory};
use crate::infrastructure::{InMemoryExperienceRepository, JsonLogicEvaluator, ObjectDataResolver};

pub struct Rig {
    pub repository: Arc<InMemoryExperienceRepository>,
    pub resolver: Arc<ObjectDataResolver>,
    pub fetchers: ExperienceFetchers,
    pub evaluator: ConditionEvaluator,
    pub factory: Arc<StoryReasonerFactory>,
    pub selector: RepresentationSelector,
}

/// Wire the in-memory adapters around an experience. Every leaf whose
/// representation collection is missing gets an empty one.
pub fn rig(mut experience: Experience, variables: Value) -> Rig {
    let missing: Vec<_> = experience
        .narrative_elements
        .iter()
        .filter_map(|e| e.representation_collection_id().cloned())
        .filter(|id| !experience.representation_collections.iter().any(|c| &c.id == id))
        .collect();
    for id in missing {
        let name = id.to_string();
        experience = experience.with_collection(RepresentationCollection::new(id, name));
    }

    let repository = Arc::new(InMemoryExperienceRepository::new(experience));
    let resolver = Arc::new(ObjectDataResolver::new(variables));
    let fetchers = ExperienceFetchers::from_source(repository.clone());
    let evaluator = ConditionEvaluator::new(resolver.clone(), Arc::new(JsonLogicEvaluator::new()));
    let factory = StoryReasonerFactory::new(fetchers.clone(), evaluator.clone());
    let selector = RepresentationSelector::new(fetchers.clone(), evaluator.clone());

    Rig {
        repository,
        resolver,
        fetchers,
        evaluator,
        factory,
        selector,
    }
}

/// A leaf element `id` shown through collection `rc-<id>`
pub fn leaf(id: &str, links: Vec<Link>) -> NarrativeElement {
    let mut element = NarrativeElement::leaf(id, id.to_uppercase(), format!("rc-{id}"));
    element.links = links;
    element
}

pub fn ids(list: &[&str]) -> Vec<NarrativeElementId> {
    list.iter().map(|id| NarrativeElementId::from(*id)).collect()
}

pub fn history(list: &[&str]) -> PathHistory {
    PathHistory::from(ids(list))
}

/// Ids of the elements that became current, in order
pub fn changed_ids(events: &[ReasonerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ReasonerEvent::NarrativeElementChanged(element) => Some(element.id.to_string()),
            _ => None,
        })
        .collect()
}
