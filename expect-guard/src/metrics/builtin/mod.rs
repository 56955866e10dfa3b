//! Built-in metrics for the in-memory and SQL backends.
//!
//! Each submodule exposes a `register` function; [`register_all`] calls them
//! in dependency order.

pub mod lengths;
pub mod nonnull;
pub mod regex_match;
pub mod statistics;
pub mod table;
pub mod values_between;

use super::registry::{MetricRegistry, MetricRequest};
pub(crate) use crate::engine::sql_double;
use crate::engine::{DomainRows, DOMAIN_KEYS};
use crate::error::{ExpectError, Result};
use arrow::array::ArrayRef;

/// Domain kwargs of column metrics.
pub const COLUMN_DOMAIN_KEYS: &[&str] = &DOMAIN_KEYS;

/// Domain kwargs of table metrics.
pub const TABLE_DOMAIN_KEYS: &[&str] = &["batch_id", "table", "row_condition", "condition_parser"];

/// Registers every built-in metric.
pub fn register_all(registry: &mut MetricRegistry) -> Result<()> {
    table::register(registry)?;
    nonnull::register(registry)?;
    lengths::register(registry)?;
    regex_match::register(registry)?;
    values_between::register(registry)?;
    statistics::register(registry)?;
    Ok(())
}

/// The domain rows of an in-memory request plus its column.
pub(crate) fn column_rows(request: &MetricRequest<'_>) -> Result<(DomainRows, ArrayRef)> {
    let domain = request.domain()?;
    let column = domain.require_column()?.to_string();
    let rows = request.records()?;
    let array = rows
        .records
        .column_by_name(&column)
        .cloned()
        .ok_or(ExpectError::ColumnNotFound { column })?;
    Ok((rows, array))
}

/// `min_value` / `max_value` bounds with optional strictness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Lower bound; `None` leaves the range open below.
    pub min: Option<f64>,
    /// Upper bound; `None` leaves the range open above.
    pub max: Option<f64>,
    /// Excludes `min` itself from the range.
    pub strict_min: bool,
    /// Excludes `max` itself from the range.
    pub strict_max: bool,
}

impl Bounds {
    /// Reads the bounds from a request's value kwargs. At least one bound
    /// must be set.
    pub fn from_request(request: &MetricRequest<'_>) -> Result<Self> {
        let bounds = Self {
            min: request.f64_kwarg("min_value")?,
            max: request.f64_kwarg("max_value")?,
            strict_min: request.bool_kwarg("strict_min", false)?,
            strict_max: request.bool_kwarg("strict_max", false)?,
        };
        if bounds.min.is_none() && bounds.max.is_none() {
            return Err(ExpectError::Internal(format!(
                "metric '{}' needs min_value or max_value",
                request.metric.name()
            )));
        }
        Ok(bounds)
    }

    /// Whether a value lies within the bounds.
    pub fn contains(&self, value: f64) -> bool {
        let above_min = match self.min {
            Some(min) if self.strict_min => value > min,
            Some(min) => value >= min,
            None => true,
        };
        let below_max = match self.max {
            Some(max) if self.strict_max => value < max,
            Some(max) => value <= max,
            None => true,
        };
        above_min && below_max
    }

    /// The bounds as a SQL predicate over `expression`.
    pub fn to_sql(&self, expression: &str) -> String {
        let mut clauses = Vec::with_capacity(2);
        if let Some(min) = self.min {
            let op = if self.strict_min { ">" } else { ">=" };
            clauses.push(format!("({expression}) {op} {}", sql_double(min)));
        }
        if let Some(max) = self.max {
            let op = if self.strict_max { "<" } else { "<=" };
            clauses.push(format!("({expression}) {op} {}", sql_double(max)));
        }
        clauses.join(" AND ")
    }
}
