//! Internal Variables - Engine-maintained variables and external overrides

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Local, Timelike, Weekday};
use serde_json::Value;
use tracing::{info, warn};

use crate::application::ports::outbound::{VariableError, VariableResolverPort};
use crate::domain::entities::VariableDeclaration;
use crate::domain::value_objects::internal;

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const PORTIONS_OF_DAY: [&str; 3] = ["Morning", "Afternoon", "Evening"];

pub fn day_name(day: Weekday) -> &'static str {
    WEEKDAYS[day.num_days_from_monday() as usize]
}

/// Morning before 12:00, afternoon before 17:00, evening after
pub fn portion_of_day(hour: u32) -> &'static str {
    match hour {
        0..=11 => PORTIONS_OF_DAY[0],
        12..=16 => PORTIONS_OF_DAY[1],
        _ => PORTIONS_OF_DAY[2],
    }
}

/// Split `name=value,name=value` into pairs; malformed entries are skipped
pub fn parse_overrides(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub struct InternalVariables {
    resolver: Arc<dyn VariableResolverPort>,
}

impl InternalVariables {
    pub fn new(resolver: Arc<dyn VariableResolverPort>) -> Self {
        Self { resolver }
    }

    /// Set the clock-derived variables from local time
    pub async fn set_all(&self) -> Result<(), VariableError> {
        let now = Local::now();
        self.set(internal::DAY_OF_WEEK, Value::from(day_name(now.weekday())))
            .await?;
        self.set(internal::PORTION_OF_DAY, Value::from(portion_of_day(now.hour())))
            .await
    }

    /// Apply externally supplied values, validated against the story's
    /// declarations. Only the clock-derived internal variables may be
    /// overridden, and only with values they could take naturally.
    /// Returns the names that were applied.
    pub async fn apply_overrides(
        &self,
        overrides: &[(String, String)],
        declarations: &BTreeMap<String, VariableDeclaration>,
    ) -> Result<Vec<String>, VariableError> {
        let mut applied = Vec::new();
        for (name, raw) in overrides {
            let value = match declarations.get(name) {
                Some(declaration) => declaration.parse_override(raw),
                None if internal::ALL.contains(&name.as_str()) => validate_internal(name, raw),
                None => {
                    warn!(variable = %name, "Override ignored: variable is not declared");
                    continue;
                }
            };

            match value {
                Some(value) => {
                    self.set(name, value).await?;
                    applied.push(name.clone());
                }
                None => warn!(variable = %name, value = %raw, "Override ignored: invalid value"),
            }
        }
        Ok(applied)
    }

    async fn set(&self, name: &str, value: Value) -> Result<(), VariableError> {
        info!(variable = %name, value = %value, "Setting internal variable");
        self.resolver.set(name, value).await
    }
}

fn validate_internal(name: &str, raw: &str) -> Option<Value> {
    let valid = match name {
        internal::DAY_OF_WEEK => WEEKDAYS.contains(&raw),
        internal::PORTION_OF_DAY => PORTIONS_OF_DAY.contains(&raw),
        _ => false,
    };
    valid.then(|| Value::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::VariableType;
    use crate::infrastructure::ObjectDataResolver;
    use serde_json::json;

    #[test]
    fn test_portion_of_day_boundaries() {
        assert_eq!(portion_of_day(0), "Morning");
        assert_eq!(portion_of_day(11), "Morning");
        assert_eq!(portion_of_day(12), "Afternoon");
        assert_eq!(portion_of_day(16), "Afternoon");
        assert_eq!(portion_of_day(17), "Evening");
        assert_eq!(portion_of_day(23), "Evening");
    }

    #[test]
    fn test_day_names() {
        assert_eq!(day_name(Weekday::Mon), "Monday");
        assert_eq!(day_name(Weekday::Sun), "Sunday");
    }

    #[test]
    fn test_parse_overrides() {
        assert_eq!(
            parse_overrides("mood=angry, level=3,broken,=x"),
            vec![
                ("mood".to_string(), "angry".to_string()),
                ("level".to_string(), "3".to_string()),
            ]
        );
        assert!(parse_overrides("").is_empty());
    }

    #[tokio::test]
    async fn test_set_all_sets_clock_variables() {
        let resolver = Arc::new(ObjectDataResolver::new(json!({})));
        InternalVariables::new(resolver.clone()).set_all().await.expect("set");

        let day = resolver.get(internal::DAY_OF_WEEK).await.expect("get");
        assert!(day.and_then(|d| d.as_str().map(|s| WEEKDAYS.contains(&s))).unwrap_or(false));
        let portion = resolver.get(internal::PORTION_OF_DAY).await.expect("get");
        assert!(portion.is_some());
    }

    #[tokio::test]
    async fn test_overrides_are_validated() {
        let resolver = Arc::new(ObjectDataResolver::new(json!({})));
        let variables = InternalVariables::new(resolver.clone());
        let mut declarations = BTreeMap::new();
        declarations.insert(
            "brave".to_string(),
            VariableDeclaration::new(VariableType::Boolean, json!(false)),
        );
        declarations.insert(
            "level".to_string(),
            VariableDeclaration::new(VariableType::Number, json!(1)).with_range(0.0, 5.0),
        );

        let overrides = parse_overrides(
            "brave=True,level=9,_portion_of_day=Evening,_path_history=x,unknown=1",
        );
        let applied = variables
            .apply_overrides(&overrides, &declarations)
            .await
            .expect("apply");

        assert_eq!(applied, vec!["brave".to_string(), "_portion_of_day".to_string()]);
        assert_eq!(resolver.get("brave").await.expect("get"), Some(json!(true)));
        assert_eq!(resolver.get("level").await.expect("get"), None);
    }
}
