//! Rule evaluator port - The pluggable rule language
//!
//! Evaluation is synchronous: selection never suspends once variables have
//! been resolved.

use serde_json::Value;

use crate::domain::value_objects::RuleExpression;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Rule evaluation failed: {0}")]
    Evaluation(String),
}

pub trait RuleEvaluatorPort: Send + Sync {
    /// Dotted names of every variable the rule dereferences
    fn variables(&self, rule: &RuleExpression) -> Vec<String>;

    /// Evaluate the rule against a nested variable snapshot
    fn apply(&self, rule: &RuleExpression, data: &Value) -> Result<Value, RuleError>;
}
