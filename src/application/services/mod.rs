//! Application services - Reasoning and navigation use cases
//!
//! Services depend only on the outbound ports and the domain model; adapters
//! are injected as `Arc<dyn Port>`.

pub mod condition_evaluator;
pub mod internal_variables;
pub mod navigation_controller;
pub mod representation_selector;
pub mod story_path_walker;
pub mod story_reasoner;
pub mod story_reasoner_factory;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use condition_evaluator::{ConditionEvaluator, RuleCandidate};
pub use internal_variables::{parse_overrides, InternalVariables};
pub use navigation_controller::{
    ControllerError, ControllerStatus, NavigationController, NextStep, VariableStatus,
    DEFAULT_MAX_WALK_STEPS,
};
pub use representation_selector::RepresentationSelector;
pub use story_path_walker::{StoryPath, StoryPathItem, StoryPathWalker};
pub use story_reasoner::{ReasonerFault, StoryReasoner};
pub use story_reasoner_factory::{ReasonerFactory, StoryReasonerFactory};
