//! `column_values.between`: numeric values within bounds.

use super::{column_rows, Bounds, COLUMN_DOMAIN_KEYS};
use crate::core::MetricValue;
use crate::engine::arrow_values::numeric_at;
use crate::error::Result;
use crate::metrics::column_map::{register_condition, NullHandling};
use crate::metrics::{MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
use crate::security::SqlSecurity;
use async_trait::async_trait;

/// Condition metric name.
pub const VALUES_BETWEEN: &str = "column_values.between";

/// Registers `column_values.between` and its derived metrics.
pub fn register(registry: &mut MetricRegistry) -> Result<()> {
    register_condition(
        registry,
        MetricDefinition::new(VALUES_BETWEEN)
            .with_domain_keys(COLUMN_DOMAIN_KEYS)
            .with_value_keys(&["min_value", "max_value", "strict_min", "strict_max"]),
        NullHandling::Exclude,
        MemoryValuesBetween,
        SqlValuesBetween,
    )
}

#[derive(Debug)]
struct MemoryValuesBetween;

#[async_trait]
impl MetricProvider for MemoryValuesBetween {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let bounds = Bounds::from_request(&request)?;
        let (rows, array) = column_rows(&request)?;
        let mask = (0..rows.records.num_rows())
            .map(|i| Ok(numeric_at(array.as_ref(), i)?.map(|v| bounds.contains(v))))
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricValue::Mask(mask))
    }
}

#[derive(Debug)]
struct SqlValuesBetween;

#[async_trait]
impl MetricProvider for SqlValuesBetween {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let bounds = Bounds::from_request(&request)?;
        let domain = request.domain()?;
        let column = SqlSecurity::escape_identifier(domain.require_column()?)?;
        let value = format!("CAST({column} AS DOUBLE)");
        // NaN sorts above every number in SQL but fails every bound in memory.
        Ok(MetricValue::Expression(format!(
            "NOT isnan({value}) AND {}",
            bounds.to_sql(&value)
        )))
    }
}
