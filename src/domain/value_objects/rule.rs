//! Rule expressions and the ranking of their results
//!
//! Rules are JSONLogic-compatible documents. The domain only cares about what
//! a rule evaluated to, and how two such outcomes compare.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSONLogic-compatible rule, kept as the raw document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleExpression(Value);

impl RuleExpression {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    /// A rule that always evaluates to `true`
    pub fn always() -> Self {
        Self(Value::Bool(true))
    }

    pub fn document(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RuleExpression {
    fn from(document: Value) -> Self {
        Self(document)
    }
}

impl From<bool> for RuleExpression {
    fn from(value: bool) -> Self {
        Self(Value::Bool(value))
    }
}

/// What a rule evaluated to, reduced to the two shapes selection understands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleOutcome {
    Truth(bool),
    Score(f64),
    /// Anything else (null, objects, non-numeric strings); never passes
    Inert,
}

impl RuleOutcome {
    /// Reduce an evaluated JSON value. Numeric strings count as scores.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Truth(*b),
            Value::Number(n) => n.as_f64().map(Self::Score).unwrap_or(Self::Inert),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Self::Score)
                .unwrap_or(Self::Inert),
            _ => Self::Inert,
        }
    }

    /// Strictly greater than zero, with `true` as 1 and `false` as 0.
    /// An exact `0.0` (e.g. `1.0 - 1.0`) fails, as does NaN.
    pub fn passes(&self) -> bool {
        match self {
            Self::Truth(b) => *b,
            Self::Score(s) => *s > 0.0,
            Self::Inert => false,
        }
    }

    /// Order two passing outcomes best-first: `true` above every number,
    /// otherwise the larger score. Equal outcomes compare `Equal` so a
    /// stable sort keeps input order.
    pub fn rank(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Truth(true), Self::Truth(true)) => Ordering::Equal,
            (Self::Truth(true), _) => Ordering::Less,
            (_, Self::Truth(true)) => Ordering::Greater,
            (Self::Score(a), Self::Score(b)) => b.partial_cmp(a).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_zero_score_fails() {
        assert!(!RuleOutcome::Score(1.0 - 1.0).passes());
        assert!(!RuleOutcome::Score(-0.5).passes());
        assert!(!RuleOutcome::Score(f64::NAN).passes());
        assert!(RuleOutcome::Score(0.0001).passes());
    }

    #[test]
    fn test_truth_outranks_any_score() {
        let truth = RuleOutcome::Truth(true);
        assert_eq!(truth.rank(&RuleOutcome::Score(1e300)), Ordering::Less);
        assert_eq!(RuleOutcome::Score(f64::INFINITY).rank(&truth), Ordering::Greater);
        assert_eq!(truth.rank(&truth), Ordering::Equal);
    }

    #[test]
    fn test_higher_score_ranks_first() {
        let low = RuleOutcome::Score(0.5);
        let high = RuleOutcome::Score(0.9);
        assert_eq!(high.rank(&low), Ordering::Less);
        assert_eq!(low.rank(&high), Ordering::Greater);
        assert_eq!(low.rank(&RuleOutcome::Score(0.5)), Ordering::Equal);
    }

    #[test]
    fn test_outcome_from_value() {
        assert_eq!(RuleOutcome::from_value(&json!(true)), RuleOutcome::Truth(true));
        assert_eq!(RuleOutcome::from_value(&json!(1.5)), RuleOutcome::Score(1.5));
        assert_eq!(RuleOutcome::from_value(&json!("2")), RuleOutcome::Score(2.0));
        assert_eq!(RuleOutcome::from_value(&json!("abc")), RuleOutcome::Inert);
        assert_eq!(RuleOutcome::from_value(&Value::Null), RuleOutcome::Inert);
        assert!(!RuleOutcome::from_value(&json!(false)).passes());
    }
}
