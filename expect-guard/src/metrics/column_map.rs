//! Column-map metric family.
//!
//! A *condition* metric judges each row of a column: on the in-memory backend
//! it resolves to a [`MetricValue::Mask`] (`Some(true)` expected,
//! `Some(false)` unexpected, `None` not judged), on the SQL backend to a
//! [`MetricValue::Expression`] that is true for expected rows.
//!
//! Registering a condition `X` also registers, each depending on `X`:
//!
//! | metric | value | backends |
//! |---|---|---|
//! | `X.unexpected_count` | number of unexpected rows | all |
//! | `X.unexpected_values` | column value of each unexpected row | all |
//! | `X.unexpected_rows` | full record of each unexpected row | all |
//! | `X.unexpected_index_list` | batch row index of each unexpected row | in-memory |

use super::registry::{MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
use crate::core::MetricValue;
use crate::engine::arrow_values::{row_to_json, value_at};
use crate::engine::{Backend, SqlQuery};
use crate::error::{ExpectError, Result};
use crate::security::SqlSecurity;
use async_trait::async_trait;
use serde_json::Value;

/// Dependency name under which derived metrics receive their condition.
pub const CONDITION: &str = "unexpected_condition";

/// Suffix of the unexpected row count metric.
pub const UNEXPECTED_COUNT: &str = "unexpected_count";
/// Suffix of the unexpected value list metric.
pub const UNEXPECTED_VALUES: &str = "unexpected_values";
/// Suffix of the unexpected row index list metric.
pub const UNEXPECTED_INDEX_LIST: &str = "unexpected_index_list";
/// Suffix of the unexpected row records metric.
pub const UNEXPECTED_ROWS: &str = "unexpected_rows";

/// The full name of a derived metric, e.g. `column_values.nonnull.unexpected_count`.
pub fn derived(condition: &str, suffix: &str) -> String {
    format!("{condition}.{suffix}")
}

/// Whether null rows take part in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullHandling {
    /// Nulls are neither expected nor unexpected.
    Exclude,
    /// The condition judges null rows too.
    Include,
}

/// Registers a condition metric and its derived metrics.
pub fn register_condition<M, S>(
    registry: &mut MetricRegistry,
    definition: MetricDefinition,
    nulls: NullHandling,
    memory: M,
    sql: S,
) -> Result<()>
where
    M: MetricProvider + 'static,
    S: MetricProvider + 'static,
{
    let condition = definition.name().to_string();
    let domain_keys: Vec<&str> = definition.domain_keys().iter().map(String::as_str).collect();
    let value_keys: Vec<&str> = definition.value_keys().iter().map(String::as_str).collect();

    for suffix in [
        UNEXPECTED_COUNT,
        UNEXPECTED_VALUES,
        UNEXPECTED_INDEX_LIST,
        UNEXPECTED_ROWS,
    ] {
        let parent = condition.clone();
        registry.define(
            MetricDefinition::new(derived(&condition, suffix))
                .with_domain_keys(&domain_keys)
                .with_value_keys(&value_keys)
                .with_dependencies(move |m| vec![(CONDITION.to_string(), m.derive(parent.as_str()))]),
        )?;
    }
    registry.define(definition)?;

    registry.register(&condition, Backend::InMemory, memory)?;
    registry.register(&condition, Backend::Sql, sql)?;

    registry.register(
        &derived(&condition, UNEXPECTED_COUNT),
        Backend::InMemory,
        MaskUnexpectedCount,
    )?;
    registry.register(
        &derived(&condition, UNEXPECTED_VALUES),
        Backend::InMemory,
        MaskUnexpectedValues,
    )?;
    registry.register(
        &derived(&condition, UNEXPECTED_INDEX_LIST),
        Backend::InMemory,
        MaskUnexpectedIndexList,
    )?;
    registry.register(
        &derived(&condition, UNEXPECTED_ROWS),
        Backend::InMemory,
        MaskUnexpectedRows,
    )?;

    registry.register(
        &derived(&condition, UNEXPECTED_COUNT),
        Backend::Sql,
        SqlUnexpectedCount { nulls },
    )?;
    registry.register(
        &derived(&condition, UNEXPECTED_VALUES),
        Backend::Sql,
        SqlUnexpectedValues { nulls },
    )?;
    registry.register(
        &derived(&condition, UNEXPECTED_ROWS),
        Backend::Sql,
        SqlUnexpectedRows { nulls },
    )?;
    Ok(())
}

/// Positions of unexpected rows within the domain rows.
fn unexpected_positions(mask: &[Option<bool>]) -> impl Iterator<Item = usize> + '_ {
    mask.iter()
        .enumerate()
        .filter_map(|(i, m)| (*m == Some(false)).then_some(i))
}

fn aligned(mask: &[Option<bool>], rows: usize) -> Result<()> {
    if mask.len() != rows {
        return Err(ExpectError::Internal(format!(
            "condition mask has {} entries for {rows} domain rows",
            mask.len()
        )));
    }
    Ok(())
}

#[derive(Debug)]
struct MaskUnexpectedCount;

#[async_trait]
impl MetricProvider for MaskUnexpectedCount {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let mask = request.dependency(CONDITION)?.expect_mask()?;
        Ok(MetricValue::from(unexpected_positions(mask).count()))
    }
}

#[derive(Debug)]
struct MaskUnexpectedValues;

#[async_trait]
impl MetricProvider for MaskUnexpectedValues {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let mask = request.dependency(CONDITION)?.expect_mask()?;
        let domain = request.domain()?;
        let column = domain.require_column()?;
        let rows = request.records()?;
        aligned(mask, rows.records.num_rows())?;

        let array = rows
            .records
            .column_by_name(column)
            .ok_or_else(|| ExpectError::ColumnNotFound {
                column: column.to_string(),
            })?;
        Ok(MetricValue::List(
            unexpected_positions(mask)
                .map(|i| value_at(array.as_ref(), i))
                .collect(),
        ))
    }
}

#[derive(Debug)]
struct MaskUnexpectedIndexList;

#[async_trait]
impl MetricProvider for MaskUnexpectedIndexList {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let mask = request.dependency(CONDITION)?.expect_mask()?;
        let rows = request.records()?;
        aligned(mask, rows.indices.len())?;
        Ok(MetricValue::List(
            unexpected_positions(mask)
                .map(|i| Value::from(rows.indices[i]))
                .collect(),
        ))
    }
}

#[derive(Debug)]
struct MaskUnexpectedRows;

#[async_trait]
impl MetricProvider for MaskUnexpectedRows {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let mask = request.dependency(CONDITION)?.expect_mask()?;
        let rows = request.records()?;
        aligned(mask, rows.records.num_rows())?;
        Ok(MetricValue::Rows(
            unexpected_positions(mask)
                .map(|i| row_to_json(&rows.records, i))
                .collect(),
        ))
    }
}

/// The query pieces shared by SQL derived metrics: the domain and a
/// predicate selecting unexpected rows.
async fn unexpected_query(
    request: &MetricRequest<'_>,
    nulls: NullHandling,
) -> Result<(SqlQuery, String, String)> {
    let expression = request.dependency(CONDITION)?.expect_expression()?;
    let domain = request.domain()?;
    let column = SqlSecurity::escape_identifier(domain.require_column()?)?;
    let query = request.sql()?.domain_query(request.batch, &domain).await?;
    let predicate = match nulls {
        NullHandling::Exclude => format!("{column} IS NOT NULL AND NOT ({expression})"),
        NullHandling::Include => format!("NOT ({expression})"),
    };
    Ok((query, column, predicate))
}

#[derive(Debug)]
struct SqlUnexpectedCount {
    nulls: NullHandling,
}

#[async_trait]
impl MetricProvider for SqlUnexpectedCount {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (query, _, predicate) = unexpected_query(&request, self.nulls).await?;
        let sql = format!("SELECT COUNT(*) {}", query.from_where(Some(&predicate)));
        Ok(MetricValue::from(request.sql()?.query_count(&sql).await?))
    }
}

#[derive(Debug)]
struct SqlUnexpectedValues {
    nulls: NullHandling,
}

#[async_trait]
impl MetricProvider for SqlUnexpectedValues {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (query, column, predicate) = unexpected_query(&request, self.nulls).await?;
        let sql = format!("SELECT {column} {}", query.from_where(Some(&predicate)));
        Ok(MetricValue::List(request.sql()?.query_values(&sql).await?))
    }
}

#[derive(Debug)]
struct SqlUnexpectedRows {
    nulls: NullHandling,
}

#[async_trait]
impl MetricProvider for SqlUnexpectedRows {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (query, _, predicate) = unexpected_query(&request, self.nulls).await?;
        let sql = format!("SELECT * {}", query.from_where(Some(&predicate)));
        Ok(MetricValue::Rows(request.sql()?.query_rows(&sql).await?))
    }
}
