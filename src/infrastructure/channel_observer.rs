//! Channel observer - Forwards engine notifications as serialisable messages
//!
//! The presentation side owns the receiving half of an unbounded channel and
//! renders, logs or relays each `PlayerEvent` in order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::application::ports::outbound::NarrativeObserver;
use crate::domain::entities::{Link, NarrativeElement};
use crate::domain::events::ReasonerError;

/// Messages from the engine to a presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    NarrativeElementChanged { element: NarrativeElement },
    StoryEnd,
    Error { kind: String, message: String },
    ElementFound { element: NarrativeElement },
    WalkComplete { linear_path: Vec<NarrativeElement> },
    NextElements { elements: Vec<NarrativeElement> },
    LinkChoice { links: Vec<Link> },
    VariableChanged { name: String, value: Value },
}

pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self { sender }
    }

    /// An observer together with the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: PlayerEvent) {
        // A dropped receiver only means nobody is listening any more
        if self.sender.send(event).is_err() {
            tracing::trace!("Player event dropped; receiver closed");
        }
    }
}

impl NarrativeObserver for ChannelObserver {
    fn on_narrative_element_changed(&self, element: &NarrativeElement) {
        self.send(PlayerEvent::NarrativeElementChanged {
            element: element.clone(),
        });
    }

    fn on_story_end(&self) {
        self.send(PlayerEvent::StoryEnd);
    }

    fn on_error(&self, error: &ReasonerError) {
        self.send(PlayerEvent::Error {
            kind: error.kind.to_string(),
            message: error.message.clone(),
        });
    }

    fn on_element_found(&self, element: &NarrativeElement) {
        self.send(PlayerEvent::ElementFound {
            element: element.clone(),
        });
    }

    fn on_walk_complete(&self, path: &[NarrativeElement]) {
        self.send(PlayerEvent::WalkComplete {
            linear_path: path.to_vec(),
        });
    }

    fn on_next_elements(&self, elements: &[NarrativeElement]) {
        self.send(PlayerEvent::NextElements {
            elements: elements.to_vec(),
        });
    }

    fn on_link_choice(&self, links: &[Link]) {
        self.send(PlayerEvent::LinkChoice {
            links: links.to_vec(),
        });
    }

    fn on_variable_changed(&self, name: &str, value: &Value) {
        self.send(PlayerEvent::VariableChanged {
            name: name.to_string(),
            value: value.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ReasonerErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (observer, mut rx) = ChannelObserver::channel();
        let element = NarrativeElement::leaf("a", "A", "rc-a");

        observer.on_narrative_element_changed(&element);
        observer.on_variable_changed("brave", &json!(true));
        observer.on_story_end();

        assert_eq!(
            rx.recv().await,
            Some(PlayerEvent::NarrativeElementChanged { element })
        );
        assert!(matches!(rx.recv().await, Some(PlayerEvent::VariableChanged { name, .. }) if name == "brave"));
        assert_eq!(rx.recv().await, Some(PlayerEvent::StoryEnd));
    }

    #[test]
    fn test_error_serialises_with_kind_tag() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.on_error(&ReasonerError::new(ReasonerErrorKind::NoValidLinks, "stuck at a"));

        let event = rx.try_recv().expect("event");
        let wire = serde_json::to_value(&event).expect("serialise");
        assert_eq!(
            wire,
            json!({"type": "Error", "kind": "NoValidLinks", "message": "stuck at a"})
        );
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (observer, rx) = ChannelObserver::channel();
        drop(rx);
        observer.on_story_end();
    }
}
