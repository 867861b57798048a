//! # Filter Conditions
//!
//! Comparison operators used by search fields and the conditions a driver
//! applies to a query.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Record;

/// Filter operators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Equals
    #[default]
    Eq,

    /// Not equals
    Ne,

    /// Greater than
    Gt,

    /// Greater than or equal
    Gte,

    /// Less than
    Lt,

    /// Less than or equal
    Lte,

    /// Substring match
    Contains,

    /// Prefix match
    StartsWith,

    /// Suffix match
    EndsWith,

    /// Value in list
    In,
}

impl FilterOperator {
    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::In => "in",
        }
    }
}

/// A single `field <operator> value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Record field to test
    pub field: String,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Value to compare against
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality condition
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Check if a record satisfies this condition
    pub fn matches(&self, record: &Record) -> bool {
        let field_value = match record.get(&self.field) {
            Some(v) => v,
            None => return self.operator == FilterOperator::Ne && !self.value.is_null(),
        };

        match self.operator {
            FilterOperator::Eq => loosely_equal(field_value, &self.value),
            FilterOperator::Ne => !loosely_equal(field_value, &self.value),
            FilterOperator::Gt => compare_json_values(field_value, &self.value) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                compare_json_values(field_value, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lt => compare_json_values(field_value, &self.value) == Some(Ordering::Less),
            FilterOperator::Lte => matches!(
                compare_json_values(field_value, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::Contains => match (field_value, &self.value) {
                (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
                (Value::Array(items), needle) => items.iter().any(|item| loosely_equal(item, needle)),
                _ => false,
            },
            FilterOperator::StartsWith => match (field_value.as_str(), self.value.as_str()) {
                (Some(s), Some(prefix)) => s.starts_with(prefix),
                _ => false,
            },
            FilterOperator::EndsWith => match (field_value.as_str(), self.value.as_str()) {
                (Some(s), Some(suffix)) => s.ends_with(suffix),
                _ => false,
            },
            FilterOperator::In => match &self.value {
                Value::Array(items) => items.iter().any(|item| loosely_equal(field_value, item)),
                other => loosely_equal(field_value, other),
            },
        }
    }
}

/// Equality that treats `1` and `1.0` as the same number
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Compare two JSON values for ordering.
///
/// Values of different kinds are unordered. Null sorts before everything.
pub fn compare_json_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
