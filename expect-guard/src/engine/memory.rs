//! In-process engine over Arrow record batches.

use super::{Backend, ExecutionEngine, MetricDomain, RowFilter};
use crate::core::Batch;
use crate::error::{ExpectError, Result};
use arrow::array::BooleanArray;
use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::any::Any;
use tracing::{debug, instrument};

/// Rows of a domain plus their positions in the original batch.
#[derive(Debug, Clone)]
pub struct DomainRows {
    /// The filtered records
    pub records: RecordBatch,
    /// `indices[i]` is the original row number of `records` row `i`
    pub indices: Vec<usize>,
}

/// Evaluates metrics in Rust over the batch's Arrow arrays.
///
/// Only in-memory batches are accepted; `table` domain kwargs naming anything
/// other than the batch itself are rejected.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutionEngine;

impl InMemoryExecutionEngine {
    /// Creates the engine.
    pub fn new() -> Self {
        Self
    }
}

/// Resolves a domain against an in-memory batch, keeping original row indices.
pub fn domain_rows(batch: &Batch, domain: &MetricDomain) -> Result<DomainRows> {
    domain.check_batch(batch)?;

    let records = batch.records().ok_or_else(|| {
        ExpectError::NotSupported(format!(
            "batch '{}' refers to a SQL table; use the SQL engine",
            batch.id()
        ))
    })?;

    if let Some(table) = &domain.table {
        if table != batch.id().as_str() && *table != batch.sql_table_name() {
            return Err(ExpectError::NotSupported(format!(
                "in-memory engine cannot read table '{table}'"
            )));
        }
    }

    if let Some(column) = &domain.column {
        if records.schema().column_with_name(column).is_none() {
            return Err(ExpectError::ColumnNotFound {
                column: column.clone(),
            });
        }
    }

    match domain.row_filter()? {
        None => Ok(DomainRows {
            records: records.clone(),
            indices: (0..records.num_rows()).collect(),
        }),
        Some(RowFilter::Simple(condition)) => {
            let mask = condition.evaluate(records)?;
            let indices = selected(&mask);
            debug!(
                batch.id = %batch.id(),
                row_condition = %condition,
                rows.total = records.num_rows(),
                rows.selected = indices.len(),
                "Applied row condition"
            );
            Ok(DomainRows {
                records: filter_record_batch(records, &mask)?,
                indices,
            })
        }
        Some(RowFilter::Sql(_)) => Err(ExpectError::NotSupported(
            "condition_parser 'sql' requires the SQL engine".to_string(),
        )),
    }
}

fn selected(mask: &BooleanArray) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, keep)| (keep == Some(true)).then_some(i))
        .collect()
}

#[async_trait]
impl ExecutionEngine for InMemoryExecutionEngine {
    fn backend(&self) -> Backend {
        Backend::InMemory
    }

    #[instrument(skip(self, batch), fields(batch.id = %batch.id()))]
    async fn get_domain_records(
        &self,
        batch: &Batch,
        domain: &MetricDomain,
    ) -> Result<RecordBatch> {
        Ok(domain_rows(batch, domain)?.records)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
