//! Prelude for commonly used types and traits in expect-guard.

pub use crate::config::{RuntimeConfiguration, ValidatorConfig};
pub use crate::core::{
    Batch, ExpectationConfiguration, ExpectationSuite, ExpectationValidationResult, MetricValue,
    ResultFormat, SuiteValidationResult, VerbosityTier,
};
pub use crate::engine::{Backend, ExecutionEngine, InMemoryExecutionEngine, SqlExecutionEngine};
pub use crate::error::{ErrorContext, ExpectError, Result};
pub use crate::expectations::{ColumnMapExpectation, Expectation, Registry};
pub use crate::logging::LogConfig;
pub use crate::validator::Validator;
