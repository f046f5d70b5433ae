//! Representation Selector - Picks what to show for a narrative element

use tracing::{debug, instrument, warn};

use crate::application::ports::outbound::{ExperienceFetchers, FetchError};
use crate::application::services::ConditionEvaluator;
use crate::domain::entities::{NarrativeElement, Representation, RepresentationCollection};

#[derive(Clone)]
pub struct RepresentationSelector {
    fetchers: ExperienceFetchers,
    evaluator: ConditionEvaluator,
}

impl RepresentationSelector {
    pub fn new(fetchers: ExperienceFetchers, evaluator: ConditionEvaluator) -> Self {
        Self {
            fetchers,
            evaluator,
        }
    }

    /// Best passing representation of a collection, fetched.
    /// `None` when no choice currently passes.
    pub async fn select(
        &self,
        collection: &RepresentationCollection,
    ) -> Result<Option<Representation>, FetchError> {
        let Some(choice) = self.evaluator.select(&collection.representations).await else {
            debug!(collection_id = %collection.id, "No representation passed");
            return Ok(None);
        };
        self.fetchers
            .representations
            .fetch_representation(&choice.representation_id)
            .await
            .map(Some)
    }

    /// What to show for a leaf element. An empty collection is shown as a
    /// placeholder carrying the element's description. Sub-story hosts have
    /// no representation of their own.
    #[instrument(skip(self, element), fields(element_id = %element.id))]
    pub async fn for_element(
        &self,
        element: &NarrativeElement,
    ) -> Result<Option<Representation>, FetchError> {
        let Some(collection_id) = element.representation_collection_id() else {
            return Ok(None);
        };
        let collection = self
            .fetchers
            .representation_collections
            .fetch_representation_collection(collection_id)
            .await?;

        if collection.representations.is_empty() {
            warn!(element_id = %element.id, "Narrative element has no representations; using placeholder");
            return Ok(Some(Representation::placeholder(&element.id, &element.description)));
        }
        self.select(&collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_fixtures::{leaf, rig};
    use crate::domain::entities::{Experience, RepresentationCollection};
    use serde_json::json;

    fn experience() -> Experience {
        Experience::new()
            .with_element(leaf("a", vec![]))
            .with_element(leaf("empty", vec![]).with_description("Nothing to see"))
            .with_collection(
                RepresentationCollection::new("rc-a", "A")
                    .with_choice("rep-desktop", json!({"==": [{"var": "device"}, "desktop"]}))
                    .with_choice("rep-any", true),
            )
            .with_collection(RepresentationCollection::new("rc-empty", "Empty"))
            .with_representation(Representation::new("rep-desktop", "Desktop", "urn:video"))
            .with_representation(Representation::new("rep-any", "Any", "urn:video"))
    }

    #[tokio::test]
    async fn test_for_element_prefers_first_true_choice() {
        let rig = rig(experience(), json!({"device": "desktop"}));
        let element = leaf("a", vec![]);

        let chosen = rig.selector.for_element(&element).await.expect("fetch");
        assert_eq!(chosen.map(|r| r.id.to_string()), Some("rep-desktop".to_string()));
    }

    #[tokio::test]
    async fn test_for_element_falls_through_to_next_choice() {
        let rig = rig(experience(), json!({"device": "phone"}));
        let element = leaf("a", vec![]);

        let chosen = rig.selector.for_element(&element).await.expect("fetch");
        assert_eq!(chosen.map(|r| r.id.to_string()), Some("rep-any".to_string()));
    }

    #[tokio::test]
    async fn test_empty_collection_uses_placeholder() {
        let rig = rig(experience(), json!({}));
        let element = leaf("empty", vec![]).with_description("Nothing to see");

        let chosen = rig
            .selector
            .for_element(&element)
            .await
            .expect("fetch")
            .expect("placeholder");
        assert!(chosen.is_placeholder());
        assert_eq!(chosen.description.as_deref(), Some("Nothing to see"));
    }

    #[tokio::test]
    async fn test_no_passing_choice() {
        let rig = rig(experience(), json!({}));
        let collection = RepresentationCollection::new("rc-x", "X").with_choice("rep-any", false);
        assert!(rig.selector.select(&collection).await.expect("fetch").is_none());
    }
}
