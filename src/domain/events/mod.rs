//! Domain events - Notifications produced while reasoning over a story

mod reasoner_events;

pub use reasoner_events::{ReasonerError, ReasonerErrorKind, ReasonerEvent};
