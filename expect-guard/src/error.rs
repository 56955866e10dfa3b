//! Error types for the expect-guard validation engine.
//!
//! Every fallible operation in the crate returns [`ExpectError`]. The variants
//! mirror the stages of a validation run: configuration checks, registry
//! lookups, dependency-graph construction, metric resolution and result
//! shaping.

use thiserror::Error;

/// The main error type for expect-guard.
#[derive(Error, Debug)]
pub enum ExpectError {
    /// Malformed or out-of-range expectation kwargs.
    #[error("Invalid configuration for '{expectation_type}': {message}")]
    InvalidConfiguration {
        /// Expectation type whose configuration was rejected
        expectation_type: String,
        /// What was wrong with it
        message: String,
    },

    /// No expectation is registered under this type name.
    #[error("Unknown expectation type '{0}'")]
    UnknownExpectation(String),

    /// An expectation type was registered twice.
    #[error("Expectation type '{0}' is already registered")]
    DuplicateExpectation(String),

    /// No implementation of a metric exists for the requested backend.
    #[error("Metric '{metric}' has no implementation for backend '{backend}'")]
    MetricNotFound {
        /// Metric name that was looked up
        metric: String,
        /// Backend capability tag
        backend: String,
    },

    /// A different implementation was already registered for the same metric and backend.
    #[error("Metric '{metric}' already has a different implementation for backend '{backend}'")]
    DuplicateMetric {
        /// Metric name being registered
        metric: String,
        /// Backend capability tag
        backend: String,
    },

    /// Metric dependency declarations form a cycle.
    #[error("Cyclic metric dependency: {}", path.join(" -> "))]
    CyclicMetricDependency {
        /// Metric names along the cycle, first and last entries identical
        path: Vec<String>,
    },

    /// A backend implementation failed while computing a metric.
    #[error("Failed to resolve metric '{metric}' for '{expectation_type}': {source}")]
    MetricResolution {
        /// Metric that failed
        metric: String,
        /// Expectation whose dependency graph requested the metric
        expectation_type: String,
        /// Underlying failure
        #[source]
        source: Box<ExpectError>,
    },

    /// A verbosity tier name outside BOOLEAN_ONLY/BASIC/SUMMARY/COMPLETE.
    #[error("Unknown result_format '{0}'")]
    UnknownResultFormat(String),

    /// A required column is not present in the batch.
    #[error("Column '{column}' not found in batch")]
    ColumnNotFound { column: String },

    /// Data types don't match what a metric expects.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The operation is not supported by this backend or parser.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ExpectError>`.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Creates an invalid configuration error.
    pub fn invalid_configuration(
        expectation_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            expectation_type: expectation_type.into(),
            message: message.into(),
        }
    }

    /// Creates a metric-not-found error.
    pub fn metric_not_found(metric: impl Into<String>, backend: impl ToString) -> Self {
        Self::MetricNotFound {
            metric: metric.into(),
            backend: backend.to_string(),
        }
    }

    /// Wraps a provider failure with the metric and the expectation that asked for it.
    pub fn metric_resolution(
        metric: impl Into<String>,
        expectation_type: impl Into<String>,
        source: ExpectError,
    ) -> Self {
        Self::MetricResolution {
            metric: metric.into(),
            expectation_type: expectation_type.into(),
            source: Box::new(source),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Short, stable name of the variant, used as `raised_exception` in results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "InvalidConfigurationError",
            Self::UnknownExpectation(_) => "UnknownExpectationError",
            Self::DuplicateExpectation(_) => "DuplicateExpectationError",
            Self::MetricNotFound { .. } => "MetricNotFoundError",
            Self::DuplicateMetric { .. } => "DuplicateMetricError",
            Self::CyclicMetricDependency { .. } => "CyclicMetricDependencyError",
            Self::MetricResolution { .. } => "MetricResolutionError",
            Self::UnknownResultFormat(_) => "UnknownResultFormatError",
            Self::ColumnNotFound { .. } => "ColumnNotFoundError",
            Self::TypeMismatch { .. } => "TypeMismatchError",
            Self::NotSupported(_) => "NotSupportedError",
            Self::DataFusion(_) => "DataFusionError",
            Self::Arrow(_) => "ArrowError",
            Self::Serialization(_) => "SerializationError",
            Self::SecurityError(_) => "SecurityError",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<serde_json::Error> for ExpectError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ExpectError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            ExpectError::Internal(inner) => ExpectError::Internal(format!("{msg}: {inner}")),
            other => ExpectError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                ExpectError::Internal(inner) => ExpectError::Internal(format!("{msg}: {inner}")),
                other => ExpectError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}
