//! Core data model shared by the metric graph, the expectations and the
//! validator.
//!
//! ## Overview
//!
//! - **[`ExpectationConfiguration`]**: a named assertion type plus its kwargs
//! - **[`ExpectationSuite`]**: configurations validated together against one batch
//! - **[`Batch`]**: an identified slice of tabular data
//! - **[`MetricValue`]**: what a metric resolves to
//! - **[`ResultFormat`]** / **[`VerbosityTier`]**: how much detail a result carries
//! - **[`ExpectationValidationResult`]** / **[`SuiteValidationResult`]**: outputs
//!
//! ## Data flow
//!
//! ```text
//! ExpectationConfiguration
//!     └── dependency graph (metrics::GraphBuilder)
//!         └── resolved metrics (metrics::GraphResolver + ExecutionEngine + Batch)
//!             └── expectation logic (expectations::Expectation::validate)
//!                 └── formatter::format_map_output
//!                     └── ExpectationValidationResult
//! ```

mod batch;
mod configuration;
mod result;
mod result_format;
mod value;

pub use batch::{Batch, BatchData, BatchId};
pub use configuration::{ExpectationConfiguration, ExpectationSuite};
pub use result::{
    fields, ExceptionInfo, ExpectationValidationResult, ResultDetails, SuiteValidationResult,
    ValidationStatistics,
};
pub use result_format::{ResultFormat, VerbosityTier, DEFAULT_PARTIAL_UNEXPECTED_COUNT};
pub use value::{float_to_json, MetricValue, Row};
