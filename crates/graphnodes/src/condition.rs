//! Conditions over pool variables, used by loop-end markers.

use graphcore::{Segment, VariablePool, VariableSelector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not contains", alias = "not_contains")]
    NotContains,
    #[serde(rename = "start with", alias = "start_with")]
    StartWith,
    #[serde(rename = "end with", alias = "end_with")]
    EndWith,
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "is not", alias = "is_not")]
    IsNot,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "not empty", alias = "not_empty")]
    NotEmpty,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in", alias = "not_in")]
    NotIn,
    #[serde(rename = "=", alias = "equal")]
    Equal,
    #[serde(rename = "≠", alias = "not_equal")]
    NotEqual,
    #[serde(rename = ">", alias = "greater_than")]
    GreaterThan,
    #[serde(rename = "<", alias = "less_than")]
    LessThan,
    #[serde(rename = "≥", alias = "greater_or_equal")]
    GreaterOrEqual,
    #[serde(rename = "≤", alias = "less_or_equal")]
    LessOrEqual,
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "not null", alias = "not_null")]
    NotNull,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub variable_selector: VariableSelector,
    pub comparison_operator: ComparisonOperator,
    #[serde(default)]
    pub value: Value,
}

/// Combine `conditions` with `operator`. An empty list holds.
pub fn evaluate_conditions(
    conditions: &[Condition],
    operator: LogicalOperator,
    pool: &VariablePool,
) -> bool {
    if conditions.is_empty() {
        return true;
    }
    match operator {
        LogicalOperator::And => conditions.iter().all(|c| evaluate_condition(c, pool)),
        LogicalOperator::Or => conditions.iter().any(|c| evaluate_condition(c, pool)),
    }
}

/// Evaluate a single condition. An absent variable behaves as `none`.
pub fn evaluate_condition(condition: &Condition, pool: &VariablePool) -> bool {
    let actual = pool
        .get(&condition.variable_selector)
        .unwrap_or_else(Segment::none);
    let expected = &condition.value;

    match condition.comparison_operator {
        ComparisonOperator::Contains => contains(&actual, expected),
        ComparisonOperator::NotContains => !contains(&actual, expected),
        ComparisonOperator::StartWith => {
            !actual.is_none() && actual.text().starts_with(&value_text(expected))
        }
        ComparisonOperator::EndWith => {
            !actual.is_none() && actual.text().ends_with(&value_text(expected))
        }
        ComparisonOperator::Is => !actual.is_none() && actual.text() == value_text(expected),
        ComparisonOperator::IsNot => actual.is_none() || actual.text() != value_text(expected),
        ComparisonOperator::Empty => actual.is_empty(),
        ComparisonOperator::NotEmpty => !actual.is_empty(),
        ComparisonOperator::In => is_in(&actual, expected),
        ComparisonOperator::NotIn => !is_in(&actual, expected),
        ComparisonOperator::Equal => compare(&actual, expected, |a, b| a == b),
        ComparisonOperator::NotEqual => !compare(&actual, expected, |a, b| a == b),
        ComparisonOperator::GreaterThan => compare(&actual, expected, |a, b| a > b),
        ComparisonOperator::LessThan => compare(&actual, expected, |a, b| a < b),
        ComparisonOperator::GreaterOrEqual => compare(&actual, expected, |a, b| a >= b),
        ComparisonOperator::LessOrEqual => compare(&actual, expected, |a, b| a <= b),
        ComparisonOperator::Null => actual.is_none(),
        ComparisonOperator::NotNull => !actual.is_none(),
    }
}

fn value_text(value: &Value) -> String {
    Segment::infer(value.clone()).text()
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn contains(actual: &Segment, expected: &Value) -> bool {
    let needle = value_text(expected);
    match actual.value() {
        Value::String(s) => s.contains(&needle),
        Value::Array(items) => items.iter().any(|item| value_text(item) == needle),
        _ => false,
    }
}

fn is_in(actual: &Segment, expected: &Value) -> bool {
    if actual.is_none() {
        return false;
    }
    let text = actual.text();
    match expected {
        Value::Array(options) => options.iter().any(|o| value_text(o) == text),
        other => value_text(other) == text,
    }
}

fn compare(actual: &Segment, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), value_f64(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}
