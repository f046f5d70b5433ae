//! Outbound ports - Interfaces that the engine requires from external systems

mod fetcher_port;
mod observer_port;
mod rule_port;
mod session_port;
mod variable_port;

pub use fetcher_port::{
    ExperienceFetchers, FetchError, NarrativeElementFetcherPort,
    RepresentationCollectionFetcherPort, RepresentationFetcherPort, StoryFetcherPort,
};
pub use observer_port::{NarrativeObserver, NullObserver};
pub use rule_port::{RuleError, RuleEvaluatorPort};
pub use session_port::{SessionError, SessionState, SessionStorePort};
pub use variable_port::{VariableError, VariableResolverPort};
