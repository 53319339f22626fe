//! Result classifier: ordered transition rules plus a mandatory default.
//!
//! Rules are evaluated top to bottom against the JSON view of a
//! [`TaskResult`] (`{ statusCode, body, error? }`); the first match wins.
//! Rule sets are validated when they are built, so classification itself
//! cannot fail.
//!
//! ```yaml
//! choices:
//!   rules:
//!     - when:
//!         numeric_equals: { variable: "$.statusCode", value: 200 }
//!       next: RunConsumer
//!   default: Fail
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::ConfigError;
use crate::models::execution::ExecutionState;
use crate::models::task::TaskResult;
use crate::workflow::jsonpath::JsonPath;

/// A predicate over the result document.
///
/// Numeric comparisons only match JSON numbers: a string `"200"` never
/// equals `200`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    NumericEquals { variable: JsonPath, value: Number },
    NumericLessThan { variable: JsonPath, value: Number },
    NumericLessThanEquals { variable: JsonPath, value: Number },
    NumericGreaterThan { variable: JsonPath, value: Number },
    NumericGreaterThanEquals { variable: JsonPath, value: Number },
    StringEquals { variable: JsonPath, value: String },
    BooleanEquals { variable: JsonPath, value: bool },
    IsPresent {
        variable: JsonPath,
        #[serde(default = "default_true")]
        value: bool,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

fn default_true() -> bool {
    true
}

impl Condition {
    /// `$.statusCode == code`
    pub fn status_code_equals(code: i64) -> Self {
        Condition::NumericEquals {
            variable: JsonPath::field("statusCode"),
            value: Number::from(code),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Condition::NumericEquals { variable, value } => {
                compare(variable, doc, value) == Some(Ordering::Equal)
            }
            Condition::NumericLessThan { variable, value } => {
                compare(variable, doc, value) == Some(Ordering::Less)
            }
            Condition::NumericLessThanEquals { variable, value } => matches!(
                compare(variable, doc, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Condition::NumericGreaterThan { variable, value } => {
                compare(variable, doc, value) == Some(Ordering::Greater)
            }
            Condition::NumericGreaterThanEquals { variable, value } => matches!(
                compare(variable, doc, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::StringEquals { variable, value } => {
                variable.resolve(doc).and_then(Value::as_str) == Some(value.as_str())
            }
            Condition::BooleanEquals { variable, value } => {
                variable.resolve(doc).and_then(Value::as_bool) == Some(*value)
            }
            Condition::IsPresent { variable, value } => {
                let present = !matches!(variable.resolve(doc), None | Some(Value::Null));
                present == *value
            }
            Condition::And(all) => all.iter().all(|c| c.matches(doc)),
            Condition::Or(any) => any.iter().any(|c| c.matches(doc)),
            Condition::Not(inner) => !inner.matches(doc),
        }
    }
}

fn compare(variable: &JsonPath, doc: &Value, expected: &Number) -> Option<Ordering> {
    match variable.resolve(doc)? {
        Value::Number(actual) => compare_numbers(actual, expected),
        _ => None,
    }
}

/// Integers compare exactly; anything else falls back to `f64`.
fn compare_numbers(actual: &Number, expected: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (actual.as_i64(), expected.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (actual.as_u64(), expected.as_u64()) {
        return Some(a.cmp(&b));
    }
    actual.as_f64()?.partial_cmp(&expected.as_f64()?)
}

/// `when` → `next`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    /// Written as a single-key map (`numeric_equals: {...}`), nested
    /// conditions included.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub when: Condition,
    pub next: ExecutionState,
}

impl TransitionRule {
    pub fn new(when: Condition, next: ExecutionState) -> Self {
        Self { when, next }
    }
}

/// A validated choice point.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceRules {
    stage: String,
    rules: Vec<TransitionRule>,
    default: ExecutionState,
}

impl ChoiceRules {
    /// Build a choice point. Every rule target and the default must be one
    /// of `allowed`, and a default must be declared.
    pub fn new(
        stage: &str,
        rules: Vec<TransitionRule>,
        default: Option<ExecutionState>,
        allowed: &[ExecutionState],
    ) -> Result<Self, ConfigError> {
        let default = default.ok_or_else(|| ConfigError::MissingDefault {
            stage: stage.to_string(),
        })?;

        let targets = rules.iter().map(|r| r.next).chain(std::iter::once(default));
        for target in targets {
            if !allowed.contains(&target) {
                return Err(ConfigError::IllegalTarget {
                    stage: stage.to_string(),
                    target: target.to_string(),
                });
            }
        }

        Ok(Self {
            stage: stage.to_string(),
            rules,
            default,
        })
    }

    /// The default predicate: `statusCode == 200` goes to `on_success`,
    /// everything else to `Fail`.
    pub fn success_on_200(stage: &str, on_success: ExecutionState) -> Self {
        Self {
            stage: stage.to_string(),
            rules: vec![TransitionRule::new(
                Condition::status_code_equals(200),
                on_success,
            )],
            default: ExecutionState::Fail,
        }
    }

    /// Pick the next state for a result.
    pub fn classify(&self, result: &TaskResult) -> ExecutionState {
        let doc = result.to_value();
        let next = self
            .rules
            .iter()
            .find(|rule| rule.when.matches(&doc))
            .map(|rule| rule.next)
            .unwrap_or(self.default);

        tracing::debug!(
            "[Classifier] {}: statusCode {} → {}",
            self.stage,
            result.status_code,
            next
        );
        next
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    pub fn default_target(&self) -> ExecutionState {
        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ExecutionState::*;

    fn path(p: &str) -> JsonPath {
        JsonPath::parse(p).unwrap()
    }

    #[test]
    fn test_default_predicate_routes_on_status() {
        let rules = ChoiceRules::success_on_200("producer", RunConsumer);
        assert_eq!(rules.classify(&TaskResult::ok(json!({ "solved": 5 }))), RunConsumer);
        assert_eq!(rules.classify(&TaskResult::failure("upstream down")), Fail);
        assert_eq!(rules.classify(&TaskResult::new(201, Value::Null)), Fail);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = ChoiceRules::new(
            "consumer",
            vec![
                TransitionRule::new(
                    Condition::NumericGreaterThanEquals {
                        variable: path("$.statusCode"),
                        value: Number::from(500),
                    },
                    Fail,
                ),
                TransitionRule::new(
                    Condition::NumericLessThan {
                        variable: path("$.statusCode"),
                        value: Number::from(600),
                    },
                    Succeed,
                ),
            ],
            Some(Fail),
            &[Succeed, Fail],
        )
        .unwrap();

        assert_eq!(rules.classify(&TaskResult::new(503, Value::Null)), Fail);
        assert_eq!(rules.classify(&TaskResult::new(204, Value::Null)), Succeed);
    }

    #[test]
    fn test_missing_default_is_rejected() {
        let err = ChoiceRules::new("producer", vec![], None, &[RunConsumer, Fail]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingDefault {
                stage: "producer".to_string()
            }
        );
    }

    #[test]
    fn test_illegal_target_is_rejected() {
        let err = ChoiceRules::new(
            "producer",
            vec![TransitionRule::new(Condition::status_code_equals(200), Succeed)],
            Some(Fail),
            &[RunConsumer, Fail],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::IllegalTarget { ref target, .. } if target == "Succeed"));

        let err = ChoiceRules::new("consumer", vec![], Some(RunProducer), &[Succeed, Fail])
            .unwrap_err();
        assert!(matches!(err, ConfigError::IllegalTarget { .. }));
    }

    #[test]
    fn test_numeric_conditions_do_not_coerce_strings() {
        let condition = Condition::status_code_equals(200);
        assert!(condition.matches(&json!({ "statusCode": 200 })));
        assert!(!condition.matches(&json!({ "statusCode": "200" })));
        assert!(!condition.matches(&json!({})));
    }

    #[test]
    fn test_numeric_compare_mixed_int_and_float() {
        let condition = Condition::NumericLessThan {
            variable: path("$.body.ratio"),
            value: Number::from_f64(0.5).unwrap(),
        };
        assert!(condition.matches(&json!({ "body": { "ratio": 0.25 } })));
        assert!(condition.matches(&json!({ "body": { "ratio": 0 } })));
        assert!(!condition.matches(&json!({ "body": { "ratio": 1 } })));
    }

    #[test]
    fn test_string_boolean_presence_and_combinators() {
        let doc = json!({
            "statusCode": 200,
            "body": { "status": "done", "partial": false },
            "error": null
        });

        let done = Condition::StringEquals {
            variable: path("$.body.status"),
            value: "done".to_string(),
        };
        let complete = Condition::BooleanEquals {
            variable: path("$.body.partial"),
            value: false,
        };
        let has_error = Condition::IsPresent {
            variable: path("$.error"),
            value: true,
        };

        assert!(done.matches(&doc));
        assert!(complete.matches(&doc));
        assert!(!has_error.matches(&doc));
        assert!(Condition::And(vec![done.clone(), complete.clone()]).matches(&doc));
        assert!(Condition::Or(vec![has_error.clone(), done]).matches(&doc));
        assert!(Condition::Not(Box::new(has_error)).matches(&doc));
    }

    #[test]
    fn test_classify_is_idempotent() {
        let rules = ChoiceRules::success_on_200("consumer", Succeed);
        let result = TaskResult::ok(json!({ "message": "sent" }));
        let first = rules.classify(&result);
        let second = rules.classify(&result);
        assert_eq!(first, second);
        assert_eq!(first, Succeed);
    }

    #[test]
    fn test_rules_deserialize_from_yaml() {
        let yaml = r#"
- when:
    numeric_equals: { variable: "$.statusCode", value: 200 }
  next: RunConsumer
- when:
    and:
      - is_present: { variable: "$.body.error" }
      - not:
          string_equals: { variable: "$.body.error", value: "" }
  next: Fail
"#;
        let rules: Vec<TransitionRule> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].next, RunConsumer);
        assert_eq!(rules[0].when, Condition::status_code_equals(200));
        assert!(matches!(rules[1].when, Condition::And(ref inner) if inner.len() == 2));
    }

    #[test]
    fn test_rules_with_bad_path_fail_to_parse() {
        let yaml = r#"
- when:
    numeric_equals: { variable: "statusCode", value: 200 }
  next: RunConsumer
"#;
        assert!(serde_yaml::from_str::<Vec<TransitionRule>>(yaml).is_err());
    }
}
