//! JSONLogic rule adapter
//!
//! Evaluation is delegated to `jsonlogic_rs`, which follows the reference
//! JavaScript semantics. Only dependency extraction lives here: the engine
//! needs every `var`/`missing` name up front to resolve a variable snapshot.

use serde_json::{Map, Value};

use crate::application::ports::outbound::{RuleError, RuleEvaluatorPort};
use crate::domain::value_objects::RuleExpression;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLogicEvaluator;

impl JsonLogicEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl RuleEvaluatorPort for JsonLogicEvaluator {
    fn variables(&self, rule: &RuleExpression) -> Vec<String> {
        let mut names = Vec::new();
        collect_variables(rule.document(), &mut names);
        names
    }

    fn apply(&self, rule: &RuleExpression, data: &Value) -> Result<Value, RuleError> {
        jsonlogic_rs::apply(rule.document(), data).map_err(|e| RuleError::Evaluation(e.to_string()))
    }
}

fn collect_variables(document: &Value, names: &mut Vec<String>) {
    match document {
        Value::Array(items) => items.iter().for_each(|item| collect_variables(item, names)),
        Value::Object(map) => {
            if let Some((op, args)) = single_entry(map) {
                match op {
                    "var" => {
                        if let Some(name) = var_name(args).filter(|n| !n.is_empty()) {
                            push_unique(names, name);
                        }
                    }
                    "missing" | "missing_some" => {
                        // `missing_some` takes `[min, [names]]`
                        let listed = match (op, args) {
                            ("missing_some", Value::Array(items)) => {
                                items.get(1).map(arguments).unwrap_or_default()
                            }
                            _ => arguments(args),
                        };
                        for arg in listed {
                            if let Value::String(name) = arg {
                                push_unique(names, name.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
            map.values().for_each(|value| collect_variables(value, names));
        }
        _ => {}
    }
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

fn single_entry(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    if map.len() != 1 {
        return None;
    }
    map.iter().next().map(|(op, args)| (op.as_str(), args))
}

fn var_name(args: &Value) -> Option<String> {
    let name = match args {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match name {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn arguments(args: &Value) -> Vec<&Value> {
    match args {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
