//! Reasoner events - What a reasoning step reports to whoever drives it
//!
//! Every step of a story reasoner returns the events it produced, in order.
//! Runtime reasoning faults travel here as data; they are never returned as
//! `Err`, so the reasoner always stays in a well-defined state.

use crate::domain::entities::{Link, NarrativeElement};

/// Something a reasoner step produced
#[derive(Debug, Clone, PartialEq)]
pub enum ReasonerEvent {
    /// A playable (leaf) element became current
    NarrativeElementChanged(NarrativeElement),
    /// This story level terminated
    StoryEnd,
    /// A recoverable reasoning fault; the reasoner is stalled, not broken
    Error(ReasonerError),
    /// More than one beginning passed; the best was taken
    ChoiceOfBeginnings(usize),
    /// More than one link passed; the best was followed
    ChoiceOfLinks(Vec<Link>),
}

impl ReasonerEvent {
    pub fn error(kind: ReasonerErrorKind, message: impl Into<String>) -> Self {
        Self::Error(ReasonerError::new(kind, message))
    }
}

/// Kinds of recoverable reasoning faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonerErrorKind {
    NoValidBeginning,
    NoValidLinks,
    UnrecognizedLink,
    LinkTargetNotFound,
    SubStoryFetchFailed,
    ShadowWalkLoop,
    ShadowWalkExhausted,
    HistoryReplayFailed,
}

impl ReasonerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoValidBeginning => "NoValidBeginning",
            Self::NoValidLinks => "NoValidLinks",
            Self::UnrecognizedLink => "UnrecognizedLink",
            Self::LinkTargetNotFound => "LinkTargetNotFound",
            Self::SubStoryFetchFailed => "SubStoryFetchFailed",
            Self::ShadowWalkLoop => "ShadowWalkLoop",
            Self::ShadowWalkExhausted => "ShadowWalkExhausted",
            Self::HistoryReplayFailed => "HistoryReplayFailed",
        }
    }
}

impl std::fmt::Display for ReasonerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable reasoning fault with its origin preserved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ReasonerError {
    pub kind: ReasonerErrorKind,
    pub message: String,
}

impl ReasonerError {
    pub fn new(kind: ReasonerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
