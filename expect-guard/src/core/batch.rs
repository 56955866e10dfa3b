//! Batches: identified slices of tabular data.

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Arc<str>);

impl BatchId {
    /// Creates a batch id.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BatchId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Where a batch's rows live.
#[derive(Debug, Clone)]
pub enum BatchData {
    /// Rows held in memory as an Arrow record batch.
    Records(RecordBatch),
    /// A table already known to a SQL engine.
    Table(String),
}

/// An identified slice of tabular data plus its metadata.
///
/// Batches are read-only during validation. Metrics never write derived
/// columns back into a batch.
///
/// # Examples
///
/// ```rust
/// use expect_guard::core::Batch;
/// use arrow::array::StringArray;
/// use arrow::datatypes::{DataType, Field, Schema};
/// use arrow::record_batch::RecordBatch;
/// use std::sync::Arc;
///
/// let schema = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, true)]));
/// let records = RecordBatch::try_new(
///     schema,
///     vec![Arc::new(StringArray::from(vec![Some("a"), None]))],
/// )
/// .unwrap();
///
/// let batch = Batch::from_records("users-2024-01", records);
/// assert_eq!(batch.id().as_str(), "users-2024-01");
/// assert_eq!(batch.sql_table_name(), "users_2024_01");
/// ```
#[derive(Debug, Clone)]
pub struct Batch {
    id: BatchId,
    data: BatchData,
    markers: Map<String, Value>,
    loaded_at: DateTime<Utc>,
}

impl Batch {
    /// Creates an in-memory batch.
    pub fn from_records(id: impl Into<BatchId>, records: RecordBatch) -> Self {
        Self::new(id.into(), BatchData::Records(records))
    }

    /// Creates a batch that refers to a table registered on a SQL engine.
    pub fn from_table(id: impl Into<BatchId>, table: impl Into<String>) -> Self {
        Self::new(id.into(), BatchData::Table(table.into()))
    }

    fn new(id: BatchId, data: BatchData) -> Self {
        Self {
            id,
            data,
            markers: Map::new(),
            loaded_at: Utc::now(),
        }
    }

    /// Attaches an identifying marker (partition key, source path, ...).
    pub fn with_marker(mut self, key: impl Into<String>, value: Value) -> Self {
        self.markers.insert(key.into(), value);
        self
    }

    /// The batch id.
    pub fn id(&self) -> &BatchId {
        &self.id
    }

    /// The underlying data.
    pub fn data(&self) -> &BatchData {
        &self.data
    }

    /// The in-memory records, if this batch holds any.
    pub fn records(&self) -> Option<&RecordBatch> {
        match &self.data {
            BatchData::Records(records) => Some(records),
            BatchData::Table(_) => None,
        }
    }

    /// Identifying markers.
    pub fn markers(&self) -> &Map<String, Value> {
        &self.markers
    }

    /// When the batch handle was created.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// The table name a SQL engine knows this batch by.
    ///
    /// Table batches use their table name; in-memory batches derive a
    /// lower-case one from the id, replacing anything that is not alphanumeric
    /// with `_`.
    pub fn sql_table_name(&self) -> String {
        match &self.data {
            BatchData::Table(table) => table.clone(),
            BatchData::Records(_) => {
                let mut name: String = self
                    .id
                    .as_str()
                    .chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() {
                            c.to_ascii_lowercase()
                        } else {
                            '_'
                        }
                    })
                    .collect();
                if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
                    name.insert_str(0, "batch_");
                }
                name
            }
        }
    }
}
