//! `table.row_count`.

use super::TABLE_DOMAIN_KEYS;
use crate::core::MetricValue;
use crate::engine::Backend;
use crate::error::Result;
use crate::metrics::{MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
use async_trait::async_trait;

/// Number of rows in the domain (after any row condition).
pub const ROW_COUNT: &str = "table.row_count";

/// Registers `table.row_count`.
pub fn register(registry: &mut MetricRegistry) -> Result<()> {
    registry.define(MetricDefinition::new(ROW_COUNT).with_domain_keys(TABLE_DOMAIN_KEYS))?;
    registry.register(ROW_COUNT, Backend::InMemory, MemoryRowCount)?;
    registry.register(ROW_COUNT, Backend::Sql, SqlRowCount)?;
    Ok(())
}

#[derive(Debug)]
struct MemoryRowCount;

#[async_trait]
impl MetricProvider for MemoryRowCount {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        Ok(MetricValue::from(request.records()?.records.num_rows()))
    }
}

#[derive(Debug)]
struct SqlRowCount;

#[async_trait]
impl MetricProvider for SqlRowCount {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let engine = request.sql()?;
        let query = engine.domain_query(request.batch, &request.domain()?).await?;
        let count = engine
            .query_count(&format!("SELECT COUNT(*) {}", query.from_where(None)))
            .await?;
        Ok(MetricValue::from(count))
    }
}
