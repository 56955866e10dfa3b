//! SQL engine backed by a DataFusion `SessionContext`.

use super::arrow_values::{row_to_json, value_at};
use super::{Backend, ExecutionEngine, MetricDomain, RowFilter};
use crate::core::{Batch, BatchData, Row};
use crate::error::{ExpectError, Result};
use crate::security::SqlSecurity;
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::common::TableReference;
use datafusion::prelude::{SessionConfig, SessionContext};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use tracing::{debug, instrument};

/// Pushes metric computation down to DataFusion.
///
/// In-memory batches are registered as tables on [`ExecutionEngine::prepare`]
/// under [`Batch::sql_table_name`]; table batches must already be registered
/// on the context.
///
/// Row-returning metrics list unexpected values in scan order. The context
/// built by [`SqlExecutionEngine::new`] plans a single partition, so that is
/// the row order of the registered batch. A context passed to
/// [`SqlExecutionEngine::with_context`] keeps its own partitioning.
///
/// # Examples
///
/// ```rust,no_run
/// use expect_guard::engine::{ExecutionEngine, SqlExecutionEngine};
/// use datafusion::prelude::{SessionConfig, SessionContext};
///
/// # async fn example() -> expect_guard::error::Result<()> {
/// let ctx = SessionContext::new();
/// // ... register tables on ctx ...
/// let engine = SqlExecutionEngine::with_context(ctx);
/// assert_eq!(engine.backend().to_string(), "sql");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SqlExecutionEngine {
    ctx: SessionContext,
}

impl fmt::Debug for SqlExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlExecutionEngine")
            .field("session_id", &self.ctx.session_id())
            .finish()
    }
}

impl Default for SqlExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A domain resolved to a quoted table reference and a WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    table: String,
    filter: Option<String>,
}

impl SqlQuery {
    /// `FROM <table> [WHERE <filter> [AND <extra>]]`.
    pub fn from_where(&self, extra: Option<&str>) -> String {
        let predicates: Vec<String> = self
            .filter
            .iter()
            .map(String::as_str)
            .chain(extra)
            .map(|p| format!("({p})"))
            .collect();
        if predicates.is_empty() {
            format!("FROM {}", self.table)
        } else {
            format!("FROM {} WHERE {}", self.table, predicates.join(" AND "))
        }
    }

    /// The quoted table reference.
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Downcasts an engine handle to the SQL engine.
pub fn engine_of(engine: &dyn ExecutionEngine) -> Result<&SqlExecutionEngine> {
    engine
        .as_any()
        .downcast_ref::<SqlExecutionEngine>()
        .ok_or_else(|| {
            ExpectError::NotSupported(format!(
                "SQL metric invoked on '{}' engine",
                engine.backend()
            ))
        })
}

impl SqlExecutionEngine {
    /// Creates an engine over a fresh single-partition context.
    pub fn new() -> Self {
        let config = SessionConfig::new().with_target_partitions(1);
        Self::with_context(SessionContext::new_with_config(config))
    }

    /// Creates an engine over an existing context.
    pub fn with_context(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// The underlying context.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Resolves a domain to its table and filter, checking the column exists.
    pub async fn domain_query(&self, batch: &Batch, domain: &MetricDomain) -> Result<SqlQuery> {
        domain.check_batch(batch)?;

        let table_name = domain
            .table
            .clone()
            .unwrap_or_else(|| batch.sql_table_name());

        if let Some(column) = &domain.column {
            let df = self.ctx.table(table_reference(&table_name)).await?;
            if !df.schema().has_column_with_unqualified_name(column) {
                return Err(ExpectError::ColumnNotFound {
                    column: column.clone(),
                });
            }
        }

        let filter = match domain.row_filter()? {
            None => None,
            Some(RowFilter::Simple(condition)) => Some(condition.to_sql()?),
            Some(RowFilter::Sql(predicate)) => Some(predicate),
        };

        Ok(SqlQuery {
            table: SqlSecurity::escape_table_name(&table_name)?,
            filter,
        })
    }

    /// Runs a query and collects every batch.
    #[instrument(skip(self), fields(sql = %sql))]
    pub async fn collect(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        debug!("Executing metric query");
        let df = self.ctx.sql(sql).await?;
        Ok(df.collect().await?)
    }

    /// The first cell of a query result, or null when it returns no rows.
    pub async fn query_scalar(&self, sql: &str) -> Result<Value> {
        let batches = self.collect(sql).await?;
        Ok(batches
            .iter()
            .find(|b| b.num_rows() > 0 && b.num_columns() > 0)
            .map_or(Value::Null, |b| value_at(b.column(0).as_ref(), 0)))
    }

    /// A `COUNT(*)`-style query as a count.
    pub async fn query_count(&self, sql: &str) -> Result<u64> {
        match self.query_scalar(sql).await? {
            Value::Null => Ok(0),
            value => value
                .as_u64()
                .ok_or_else(|| ExpectError::type_mismatch("count", value.to_string())),
        }
    }

    /// An aggregate query as a float; `None` for SQL NULL.
    pub async fn query_f64(&self, sql: &str) -> Result<Option<f64>> {
        match self.query_scalar(sql).await? {
            Value::Null => Ok(None),
            // non-finite floats render as strings
            Value::String(s) => s
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ExpectError::type_mismatch("number", s)),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| ExpectError::type_mismatch("number", value.to_string())),
        }
    }

    /// Every value of the first result column, in result order.
    pub async fn query_values(&self, sql: &str) -> Result<Vec<Value>> {
        let batches = self.collect(sql).await?;
        Ok(batches
            .iter()
            .filter(|b| b.num_columns() > 0)
            .flat_map(|b| (0..b.num_rows()).map(move |row| value_at(b.column(0).as_ref(), row)))
            .collect())
    }

    /// Every result row as a JSON object.
    pub async fn query_rows(&self, sql: &str) -> Result<Vec<Row>> {
        let batches = self.collect(sql).await?;
        Ok(batches
            .iter()
            .flat_map(|b| (0..b.num_rows()).map(move |row| row_to_json(b, row)))
            .collect())
    }
}

/// Renders a float as a SQL double literal, including NaN and infinities.
pub fn sql_double(value: f64) -> String {
    if value.is_finite() {
        format!("CAST({value} AS DOUBLE)")
    } else {
        let name = if value.is_nan() {
            "NaN"
        } else if value > 0.0 {
            "Infinity"
        } else {
            "-Infinity"
        };
        format!("CAST('{name}' AS DOUBLE)")
    }
}

fn table_reference(name: &str) -> TableReference {
    let parts: Vec<&str> = name.split('.').collect();
    match parts.as_slice() {
        [schema, table] => TableReference::partial(*schema, *table),
        [catalog, schema, table] => TableReference::full(*catalog, *schema, *table),
        _ => TableReference::bare(name),
    }
}

#[async_trait]
impl ExecutionEngine for SqlExecutionEngine {
    fn backend(&self) -> Backend {
        Backend::Sql
    }

    #[instrument(skip(self, batch), fields(batch.id = %batch.id()))]
    async fn prepare(&self, batch: &Batch) -> Result<()> {
        if let BatchData::Records(records) = batch.data() {
            let name = batch.sql_table_name();
            self.ctx.deregister_table(table_reference(&name))?;
            self.ctx.register_batch(&name, records.clone())?;
            debug!(table = %name, rows = records.num_rows(), "Registered batch");
        }
        Ok(())
    }

    #[instrument(skip(self, batch), fields(batch.id = %batch.id()))]
    async fn get_domain_records(
        &self,
        batch: &Batch,
        domain: &MetricDomain,
    ) -> Result<RecordBatch> {
        let query = self.domain_query(batch, domain).await?;
        let df = self
            .ctx
            .sql(&format!("SELECT * {}", query.from_where(None)))
            .await?;
        let df_schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        let schema = batches.first().map_or(df_schema, RecordBatch::schema);
        Ok(concat_batches(&schema, &batches)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
