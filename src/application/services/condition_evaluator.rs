//! Condition Evaluator - The one selection policy shared by beginnings,
//! links and representation choices
//!
//! A round of selection resolves every variable the candidates' rules refer
//! to, builds a single nested snapshot from them, evaluates each rule against
//! it, and ranks the passing candidates best-first.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::debug;

use crate::application::ports::outbound::{RuleEvaluatorPort, VariableResolverPort};
use crate::domain::entities::{Beginning, Link, RepresentationChoice};
use crate::domain::value_objects::{RuleExpression, RuleOutcome, VariableSnapshot};

/// Anything that carries a rule and can take part in a selection round
pub trait RuleCandidate {
    fn condition(&self) -> &RuleExpression;
}

impl RuleCandidate for Beginning {
    fn condition(&self) -> &RuleExpression {
        &self.condition
    }
}

impl RuleCandidate for Link {
    fn condition(&self) -> &RuleExpression {
        &self.condition
    }
}

impl RuleCandidate for RepresentationChoice {
    fn condition(&self) -> &RuleExpression {
        &self.condition
    }
}

#[derive(Clone)]
pub struct ConditionEvaluator {
    resolver: Arc<dyn VariableResolverPort>,
    rules: Arc<dyn RuleEvaluatorPort>,
}

impl ConditionEvaluator {
    pub fn new(resolver: Arc<dyn VariableResolverPort>, rules: Arc<dyn RuleEvaluatorPort>) -> Self {
        Self { resolver, rules }
    }

    pub fn resolver(&self) -> &Arc<dyn VariableResolverPort> {
        &self.resolver
    }

    /// Every passing candidate, best first. Equal outcomes keep input order.
    pub async fn rank<'a, C: RuleCandidate>(&self, candidates: &'a [C]) -> Vec<&'a C> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let names: BTreeSet<String> = candidates
            .iter()
            .flat_map(|candidate| self.rules.variables(candidate.condition()))
            .collect();
        let data = self.snapshot(names).await.into_value();

        let mut passing: Vec<(RuleOutcome, &C)> = candidates
            .iter()
            .filter_map(|candidate| {
                let outcome = match self.rules.apply(candidate.condition(), &data) {
                    Ok(result) => RuleOutcome::from_value(&result),
                    Err(e) => {
                        debug!(error = %e, "Rule failed to evaluate; treating as not passing");
                        RuleOutcome::Inert
                    }
                };
                outcome.passes().then_some((outcome, candidate))
            })
            .collect();

        // Vec::sort_by is stable, so ties resolve to the earliest candidate
        passing.sort_by(|(a, _), (b, _)| a.rank(b));
        debug!(
            candidates = candidates.len(),
            passing = passing.len(),
            "Evaluated candidates"
        );
        passing.into_iter().map(|(_, candidate)| candidate).collect()
    }

    /// The single best candidate, or `None` when nothing passes
    pub async fn select<'a, C: RuleCandidate>(&self, candidates: &'a [C]) -> Option<&'a C> {
        self.rank(candidates).await.into_iter().next()
    }

    /// Resolve the named variables concurrently into one nested snapshot.
    ///
    /// A variable that fails to resolve or has no value reads as `null`;
    /// resolution failures never abort a selection round.
    pub async fn snapshot<I>(&self, names: I) -> VariableSnapshot
    where
        I: IntoIterator<Item = String>,
    {
        let names: Vec<String> = names.into_iter().collect();
        let values = join_all(names.iter().map(|name| self.resolver.get(name))).await;

        let pairs = names.into_iter().zip(values).map(|(name, resolved)| {
            let value = match resolved {
                Ok(Some(value)) => value,
                Ok(None) => Value::Null,
                Err(e) => {
                    debug!(variable = %name, error = %e, "Variable did not resolve; using null");
                    Value::Null
                }
            };
            (name, value)
        });
        VariableSnapshot::from_pairs(pairs)
    }
}
