//! Closed set of values a filter may compare against.
//!
//! JSON is converted once at the parse boundary. Objects and nested lists are
//! rejected there, so the compiler and evaluator never see them.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use super::FilterError;

/// A single non-null filter operand. Each variant binds as its own
/// PostgreSQL type (BOOL, INT8, FLOAT8, TEXT).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterScalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Scalar(FilterScalar),
    List(Vec<FilterScalar>),
}

impl FilterScalar {
    /// Converts a JSON scalar. `Ok(None)` for JSON null.
    pub fn from_json(value: &Value) -> Result<Option<Self>, FilterError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(FilterScalar::Bool(*b))),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Some(FilterScalar::Integer(i)))
                } else if let Some(f) = n.as_f64() {
                    Ok(Some(FilterScalar::Float(f)))
                } else {
                    Err(FilterError::MalformedSpecification(format!(
                        "number {n} is out of range"
                    )))
                }
            }
            Value::String(s) => Ok(Some(FilterScalar::Text(s.clone()))),
            Value::Array(_) => Err(FilterError::MalformedSpecification(
                "expected a scalar value, found a list".to_string(),
            )),
            Value::Object(_) => Err(FilterError::MalformedSpecification(
                "expected a scalar value, found an object".to_string(),
            )),
        }
    }

    /// Text rendering used for substring matching.
    pub fn as_text(&self) -> String {
        match self {
            FilterScalar::Bool(b) => b.to_string(),
            FilterScalar::Integer(i) => i.to_string(),
            FilterScalar::Float(f) => f.to_string(),
            FilterScalar::Text(s) => s.clone(),
        }
    }

    /// SQL-style comparison: numbers compare across integer/float, text with
    /// text, bool with bool. Mixed kinds are incomparable.
    pub fn compare(&self, other: &FilterScalar) -> Option<Ordering> {
        use FilterScalar::*;
        match (self, other) {
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Text(a), Text(b)) => Some(a.cmp(b)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn sql_eq(&self, other: &FilterScalar) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl From<i64> for FilterScalar {
    fn from(value: i64) -> Self {
        FilterScalar::Integer(value)
    }
}

impl From<&str> for FilterScalar {
    fn from(value: &str) -> Self {
        FilterScalar::Text(value.to_string())
    }
}

impl fmt::Display for FilterScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl FilterValue {
    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match FilterScalar::from_json(item)? {
                    Some(scalar) => Ok(scalar),
                    None => Err(FilterError::MalformedSpecification(
                        "list values may not contain null".to_string(),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FilterValue::List),
            other => Ok(FilterScalar::from_json(other)?
                .map(FilterValue::Scalar)
                .unwrap_or(FilterValue::Null)),
        }
    }

    pub fn integer(value: i64) -> Self {
        FilterValue::Scalar(FilterScalar::Integer(value))
    }

    pub fn text(value: &str) -> Self {
        FilterValue::Scalar(FilterScalar::Text(value.to_string()))
    }

    pub fn integers(values: &[i64]) -> Self {
        FilterValue::List(values.iter().copied().map(FilterScalar::Integer).collect())
    }
}
