//! # Expect Guard - Expectation-Based Data Validation for Rust
//!
//! Expect Guard validates tabular data against declarative *expectations*
//! ("values of `email` match this regex for at least 95% of rows"). Every
//! expectation is reduced to the metrics it needs; the metrics of a whole
//! suite are merged into one deduplicated dependency graph and resolved once
//! per batch, either in process over Arrow arrays or pushed down to
//! DataFusion SQL.
//!
//! ## Quick Start
//!
//! ```rust
//! use expect_guard::prelude::*;
//! use arrow::array::{Int64Array, StringArray};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let schema = Arc::new(Schema::new(vec![
//!     Field::new("email", DataType::Utf8, true),
//!     Field::new("age", DataType::Int64, true),
//! ]));
//! let records = RecordBatch::try_new(
//!     schema,
//!     vec![
//!         Arc::new(StringArray::from(vec![Some("a@x.io"), Some("b@y.io"), None])),
//!         Arc::new(Int64Array::from(vec![31, 45, 27])),
//!     ],
//! )?;
//! let batch = Batch::from_records("users-2024-06-01", records);
//!
//! let suite = ExpectationSuite::new("users")
//!     .expectation(
//!         ExpectationConfiguration::new("expect_column_values_to_match_regex")
//!             .with_kwarg("column", json!("email"))
//!             .with_kwarg("regex", json!("@")),
//!     )
//!     .expectation(
//!         ExpectationConfiguration::new("expect_column_values_to_be_between")
//!             .with_kwarg("column", json!("age"))
//!             .with_kwarg("min_value", json!(18))
//!             .with_kwarg("max_value", json!(120)),
//!     );
//!
//! let validator = Validator::builtin()?;
//! let report = validator
//!     .validate_suite(&suite, &InMemoryExecutionEngine::new(), &batch, &RuntimeConfiguration::new())
//!     .await?;
//! assert!(report.success);
//! println!("{}", report.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Result formats
//!
//! Every result is rendered at one of four verbosity tiers. Higher tiers add
//! fields and may add metrics to the graph:
//!
//! | tier | adds |
//! |---|---|
//! | `BOOLEAN_ONLY` | `success` only |
//! | `BASIC` | counts, percentages, `partial_unexpected_list` |
//! | `SUMMARY` | `partial_unexpected_counts`, `partial_unexpected_index_list` |
//! | `COMPLETE` | full `unexpected_list`, `unexpected_index_list` and `unexpected_rows` |
//!
//! ## Architecture
//!
//! - **`core`**: configurations, suites, batches, metric values and results
//! - **`metrics`**: metric registry, dependency graph and resolver
//! - **`engine`**: the in-memory and SQL execution engines
//! - **`expectations`**: the expectation trait, kwargs layering and built-ins
//! - **`formatter`**: the map-expectation result formatter
//! - **`validator`**: runs configurations and suites against batches
//! - **`config`**: validator defaults and runtime overrides
//! - **`logging`**: performance-aware logging and subscriber setup
//! - **`security`**: SQL identifier and literal screening
//!
//! ## Extending
//!
//! New condition metrics are registered with
//! [`metrics::column_map::register_condition`], which also registers the
//! derived `unexpected_*` metrics; a [`expectations::ColumnMapExpectation`]
//! over that condition then gives a complete expectation.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod expectations;
pub mod formatter;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod security;
pub mod validator;

#[cfg(test)]
pub mod test_helpers;
