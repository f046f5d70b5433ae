//! Observer port - What the presentation layer is told while a story plays
//!
//! Notifications are delivered synchronously, in the order the engine
//! produced them. Every method has a no-op default.

use serde_json::Value;

use crate::domain::entities::{Link, NarrativeElement};
use crate::domain::events::ReasonerError;

pub trait NarrativeObserver: Send + Sync {
    fn on_narrative_element_changed(&self, _element: &NarrativeElement) {}

    fn on_story_end(&self) {}

    fn on_error(&self, _error: &ReasonerError) {}

    /// A jump or history replay located its target element
    fn on_element_found(&self, _element: &NarrativeElement) {}

    /// The linearity walk finished; `path` is empty for non-linear stories
    fn on_walk_complete(&self, _path: &[NarrativeElement]) {}

    fn on_next_elements(&self, _elements: &[NarrativeElement]) {}

    fn on_link_choice(&self, _links: &[Link]) {}

    fn on_variable_changed(&self, _name: &str, _value: &Value) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl NarrativeObserver for NullObserver {}
