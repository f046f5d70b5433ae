//! Value objects - Immutable objects defined by their attributes

mod ids;
mod rule;
mod variables;

pub use ids::*;
pub use rule::{RuleExpression, RuleOutcome};
pub use variables::{internal, PathHistory, VariableSnapshot};
