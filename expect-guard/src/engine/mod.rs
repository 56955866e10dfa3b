//! Execution engines: the backends metrics are computed on.
//!
//! An engine exposes a [`Backend`] capability tag, used as the metric registry
//! key, and materializes the rows a metric domain refers to. Two engines ship
//! with the crate:
//!
//! - [`InMemoryExecutionEngine`]: evaluates metrics in Rust over Arrow arrays
//! - [`SqlExecutionEngine`]: pushes metrics down to a DataFusion `SessionContext`
//!
//! Adding a backend means implementing [`ExecutionEngine`] with a
//! [`Backend::Custom`] tag and registering metric providers under that tag.

pub mod arrow_values;
pub mod condition;
mod memory;
mod sql;

pub use condition::{Comparison, ComparisonOp, Literal, RowCondition};
pub use memory::{domain_rows, DomainRows, InMemoryExecutionEngine};
pub use sql::{engine_of, sql_double, SqlExecutionEngine, SqlQuery};

use crate::core::Batch;
use crate::error::{ExpectError, Result};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;

/// Domain kwargs understood by every engine.
pub const DOMAIN_KEYS: [&str; 5] = [
    "batch_id",
    "table",
    "column",
    "row_condition",
    "condition_parser",
];

/// Backend capability tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Arrow arrays evaluated in process.
    InMemory,
    /// SQL pushed down to DataFusion.
    Sql,
    /// A plug-in backend.
    Custom(String),
}

impl Backend {
    /// The tag as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Backend::InMemory => "in_memory",
            Backend::Sql => "sql",
            Backend::Custom(name) => name,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a row condition string is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionParser {
    /// `column op literal [and ...]`, supported everywhere.
    Simple,
    /// A raw SQL predicate, SQL backend only.
    Sql,
}

impl ConditionParser {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "simple" => Ok(ConditionParser::Simple),
            "sql" => Ok(ConditionParser::Sql),
            other => Err(ExpectError::NotSupported(format!(
                "condition_parser '{other}'"
            ))),
        }
    }
}

/// A parsed row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// A structured condition both engines understand.
    Simple(RowCondition),
    /// A screened raw SQL predicate.
    Sql(String),
}

/// The data a metric applies to, decoded from its domain kwargs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricDomain {
    /// Batch the metric was requested for, if pinned
    pub batch_id: Option<String>,
    /// Table override
    pub table: Option<String>,
    /// Column the metric reads
    pub column: Option<String>,
    /// Row filter source text
    pub row_condition: Option<String>,
    /// Parser for `row_condition`; `simple` when absent
    pub condition_parser: Option<String>,
}

impl MetricDomain {
    /// Decodes domain kwargs. Unknown keys are ignored.
    pub fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self> {
        let text = |key: &str| -> Result<Option<String>> {
            match kwargs.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(other) => Err(ExpectError::type_mismatch(
                    format!("string for domain kwarg '{key}'"),
                    other.to_string(),
                )),
            }
        };

        Ok(Self {
            batch_id: text("batch_id")?,
            table: text("table")?,
            column: text("column")?,
            row_condition: text("row_condition")?,
            condition_parser: text("condition_parser")?,
        })
    }

    /// Domain for one column.
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            ..Self::default()
        }
    }

    /// Fails if the domain pins a different batch.
    pub fn check_batch(&self, batch: &Batch) -> Result<()> {
        match &self.batch_id {
            Some(id) if id != batch.id().as_str() => Err(ExpectError::NotSupported(format!(
                "metric requested for batch '{id}' but engine was given batch '{}'",
                batch.id()
            ))),
            _ => Ok(()),
        }
    }

    /// The column, or an error naming the metric that needed one.
    pub fn require_column(&self) -> Result<&str> {
        self.column.as_deref().ok_or_else(|| {
            ExpectError::Internal("column metric requested without a 'column' domain kwarg".into())
        })
    }

    /// Parses the row condition, if any.
    pub fn row_filter(&self) -> Result<Option<RowFilter>> {
        let Some(condition) = self.row_condition.as_deref() else {
            return Ok(None);
        };
        let parser = ConditionParser::parse(self.condition_parser.as_deref().unwrap_or("simple"))?;
        match parser {
            ConditionParser::Simple => Ok(Some(RowFilter::Simple(RowCondition::parse(condition)?))),
            ConditionParser::Sql => {
                crate::security::SqlSecurity::validate_sql_expression(condition)?;
                Ok(Some(RowFilter::Sql(condition.to_string())))
            }
        }
    }
}

/// A backend that can compute metrics over a batch.
#[async_trait]
pub trait ExecutionEngine: Send + Sync + fmt::Debug {
    /// Capability tag used to pick metric implementations.
    fn backend(&self) -> Backend;

    /// Makes the batch addressable by this engine before any metric runs.
    async fn prepare(&self, _batch: &Batch) -> Result<()> {
        Ok(())
    }

    /// Materializes the rows and columns a domain refers to.
    async fn get_domain_records(&self, batch: &Batch, domain: &MetricDomain)
        -> Result<RecordBatch>;

    /// For providers that need the concrete engine.
    fn as_any(&self) -> &dyn Any;
}
