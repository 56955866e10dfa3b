//! String length metrics.

use super::{column_rows, Bounds, COLUMN_DOMAIN_KEYS};
use crate::core::MetricValue;
use crate::engine::arrow_values::string_at;
use crate::engine::Backend;
use crate::error::Result;
use crate::metrics::column_map::{register_condition, NullHandling};
use crate::metrics::{MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
use crate::security::SqlSecurity;
use async_trait::async_trait;

/// Per-row character length.
pub const VALUE_LENGTHS: &str = "column_values.value_lengths";

/// Condition: length within `min_value`/`max_value`.
pub const VALUE_LENGTH_BETWEEN: &str = "column_values.value_length_between";

/// Registers the length metrics.
pub fn register(registry: &mut MetricRegistry) -> Result<()> {
    registry.define(MetricDefinition::new(VALUE_LENGTHS).with_domain_keys(COLUMN_DOMAIN_KEYS))?;
    registry.register(VALUE_LENGTHS, Backend::InMemory, MemoryValueLengths)?;
    registry.register(VALUE_LENGTHS, Backend::Sql, SqlValueLengths)?;

    register_condition(
        registry,
        MetricDefinition::new(VALUE_LENGTH_BETWEEN)
            .with_domain_keys(COLUMN_DOMAIN_KEYS)
            .with_value_keys(&["min_value", "max_value", "strict_min", "strict_max"])
            .with_dependencies(|m| {
                vec![(
                    VALUE_LENGTHS.to_string(),
                    m.derive_domain_only(VALUE_LENGTHS),
                )]
            }),
        NullHandling::Exclude,
        MemoryLengthBetween,
        SqlLengthBetween,
    )
}

#[derive(Debug)]
struct MemoryValueLengths;

#[async_trait]
impl MetricProvider for MemoryValueLengths {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (rows, array) = column_rows(&request)?;
        Ok(MetricValue::Series(
            (0..rows.records.num_rows())
                .map(|i| string_at(array.as_ref(), i).map(|s| s.chars().count() as f64))
                .collect(),
        ))
    }
}

#[derive(Debug)]
struct SqlValueLengths;

#[async_trait]
impl MetricProvider for SqlValueLengths {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let domain = request.domain()?;
        let column = SqlSecurity::escape_identifier(domain.require_column()?)?;
        Ok(MetricValue::Expression(format!(
            "CHARACTER_LENGTH(CAST({column} AS VARCHAR))"
        )))
    }
}

#[derive(Debug)]
struct MemoryLengthBetween;

#[async_trait]
impl MetricProvider for MemoryLengthBetween {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let bounds = Bounds::from_request(&request)?;
        let lengths = request.dependency(VALUE_LENGTHS)?.expect_series()?;
        Ok(MetricValue::Mask(
            lengths
                .iter()
                .map(|len| len.map(|len| bounds.contains(len)))
                .collect(),
        ))
    }
}

#[derive(Debug)]
struct SqlLengthBetween;

#[async_trait]
impl MetricProvider for SqlLengthBetween {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let bounds = Bounds::from_request(&request)?;
        let lengths = request.dependency(VALUE_LENGTHS)?.expect_expression()?;
        Ok(MetricValue::Expression(bounds.to_sql(lengths)))
    }
}
