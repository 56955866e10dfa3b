//! `column_values.nonnull`: the null-handling condition.
//!
//! Unlike other conditions it judges null rows, so its `unexpected_count` is
//! the column's null count.

use super::{column_rows, COLUMN_DOMAIN_KEYS};
use crate::core::MetricValue;
use crate::error::Result;
use crate::metrics::column_map::{register_condition, NullHandling};
use crate::metrics::{MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
use crate::security::SqlSecurity;
use arrow::array::Array;
use async_trait::async_trait;

/// Condition metric name.
pub const NONNULL: &str = "column_values.nonnull";

/// Registers `column_values.nonnull` and its derived metrics.
pub fn register(registry: &mut MetricRegistry) -> Result<()> {
    register_condition(
        registry,
        MetricDefinition::new(NONNULL).with_domain_keys(COLUMN_DOMAIN_KEYS),
        NullHandling::Include,
        MemoryNonNull,
        SqlNonNull,
    )
}

#[derive(Debug)]
struct MemoryNonNull;

#[async_trait]
impl MetricProvider for MemoryNonNull {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (rows, array) = column_rows(&request)?;
        Ok(MetricValue::Mask(
            (0..rows.records.num_rows())
                .map(|i| Some(array.is_valid(i)))
                .collect(),
        ))
    }
}

#[derive(Debug)]
struct SqlNonNull;

#[async_trait]
impl MetricProvider for SqlNonNull {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let domain = request.domain()?;
        let column = SqlSecurity::escape_identifier(domain.require_column()?)?;
        Ok(MetricValue::Expression(format!("{column} IS NOT NULL")))
    }
}
