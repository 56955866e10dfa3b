//! Values produced by metric computations.

use crate::error::{ExpectError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single row of a batch rendered as JSON.
pub type Row = Map<String, Value>;

/// The value a metric resolves to.
///
/// Scalars and sequences are backend independent. [`MetricValue::Mask`] and
/// [`MetricValue::Series`] are per-row columns produced by the in-memory
/// backend, [`MetricValue::Expression`] is the SQL backend's equivalent: a
/// column expression that later metrics splice into their queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MetricValue {
    /// No value (e.g. the mean of an empty column).
    Null,

    /// A boolean metric value.
    Boolean(bool),

    /// An integer metric value (e.g. a count).
    Long(i64),

    /// A floating-point metric value (e.g. a mean).
    Double(f64),

    /// A string metric value.
    String(String),

    /// A sequence of values (e.g. unexpected values, row indices).
    List(Vec<Value>),

    /// Full row records.
    Rows(Vec<Row>),

    /// Per-row condition outcome; `None` for rows the condition does not judge.
    Mask(Vec<Option<bool>>),

    /// Per-row numeric derivation; `None` for rows without a value.
    Series(Vec<Option<f64>>),

    /// A backend-native SQL column expression.
    Expression(String),
}

impl MetricValue {
    /// Short name of the variant for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricValue::Null => "null",
            MetricValue::Boolean(_) => "boolean",
            MetricValue::Long(_) => "long",
            MetricValue::Double(_) => "double",
            MetricValue::String(_) => "string",
            MetricValue::List(_) => "list",
            MetricValue::Rows(_) => "rows",
            MetricValue::Mask(_) => "mask",
            MetricValue::Series(_) => "series",
            MetricValue::Expression(_) => "expression",
        }
    }

    /// Checks if the metric value is numeric (Double or Long).
    pub fn is_numeric(&self) -> bool {
        matches!(self, MetricValue::Double(_) | MetricValue::Long(_))
    }

    /// Attempts to get the numeric value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Double(v) => Some(*v),
            MetricValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Attempts to get the value as a non-negative count.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            MetricValue::Long(v) if *v >= 0 => Some(*v as u64),
            MetricValue::Double(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Returns the count or a type mismatch error.
    pub fn expect_count(&self) -> Result<u64> {
        self.as_count()
            .ok_or_else(|| ExpectError::type_mismatch("count", self.type_name()))
    }

    /// Returns the per-row mask or a type mismatch error.
    pub fn expect_mask(&self) -> Result<&[Option<bool>]> {
        match self {
            MetricValue::Mask(mask) => Ok(mask),
            other => Err(ExpectError::type_mismatch("mask", other.type_name())),
        }
    }

    /// Returns the per-row series or a type mismatch error.
    pub fn expect_series(&self) -> Result<&[Option<f64>]> {
        match self {
            MetricValue::Series(series) => Ok(series),
            other => Err(ExpectError::type_mismatch("series", other.type_name())),
        }
    }

    /// Returns the SQL expression or a type mismatch error.
    pub fn expect_expression(&self) -> Result<&str> {
        match self {
            MetricValue::Expression(expr) => Ok(expr),
            other => Err(ExpectError::type_mismatch("expression", other.type_name())),
        }
    }

    /// Returns the value list, if this is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            MetricValue::List(values) => Some(values),
            _ => None,
        }
    }

    /// Converts the value to JSON for inclusion in results.
    pub fn to_json(&self) -> Value {
        match self {
            MetricValue::Null => Value::Null,
            MetricValue::Boolean(b) => Value::Bool(*b),
            MetricValue::Long(v) => Value::from(*v),
            MetricValue::Double(v) => float_to_json(*v),
            MetricValue::String(s) => Value::String(s.clone()),
            MetricValue::List(values) => Value::Array(values.clone()),
            MetricValue::Rows(rows) => {
                Value::Array(rows.iter().cloned().map(Value::Object).collect())
            }
            MetricValue::Mask(mask) => {
                Value::Array(mask.iter().map(|m| m.map_or(Value::Null, Value::Bool)).collect())
            }
            MetricValue::Series(series) => Value::Array(
                series
                    .iter()
                    .map(|v| v.map_or(Value::Null, float_to_json))
                    .collect(),
            ),
            MetricValue::Expression(expr) => Value::String(expr.clone()),
        }
    }
}

/// Converts a float to JSON. NaN and infinities have no JSON number form and
/// are rendered as their string names so they stay countable.
pub fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Double(v) if v.fract() == 0.0 => write!(f, "{v:.0}"),
            MetricValue::Double(v) => write!(f, "{v:.4}"),
            MetricValue::Long(v) => write!(f, "{v}"),
            MetricValue::String(s) | MetricValue::Expression(s) => write!(f, "{s}"),
            MetricValue::Boolean(b) => write!(f, "{b}"),
            MetricValue::Null => write!(f, "null"),
            MetricValue::List(v) => write!(f, "List({} values)", v.len()),
            MetricValue::Rows(v) => write!(f, "Rows({} rows)", v.len()),
            MetricValue::Mask(v) => write!(f, "Mask({} rows)", v.len()),
            MetricValue::Series(v) => write!(f, "Series({} rows)", v.len()),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Double(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Long(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Long(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::from(value as u64)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Boolean(value)
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(MetricValue::Null, MetricValue::Double)
    }
}
