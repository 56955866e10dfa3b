//! Validation result types.

use super::{BatchId, ExpectationConfiguration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names used in [`ResultDetails`].
pub mod fields {
    /// Rows in the domain, nulls included.
    pub const ELEMENT_COUNT: &str = "element_count";
    /// Non-null rows that failed the condition.
    pub const UNEXPECTED_COUNT: &str = "unexpected_count";
    /// `unexpected_count` as a percentage of `element_count`.
    pub const UNEXPECTED_PERCENT: &str = "unexpected_percent";
    /// Null rows.
    pub const MISSING_COUNT: &str = "missing_count";
    /// `missing_count` as a percentage of `element_count`.
    pub const MISSING_PERCENT: &str = "missing_percent";
    /// `unexpected_count` as a percentage of the non-null rows.
    pub const UNEXPECTED_PERCENT_NONMISSING: &str = "unexpected_percent_nonmissing";
    /// The first unexpected values, capped by `partial_unexpected_count`.
    pub const PARTIAL_UNEXPECTED_LIST: &str = "partial_unexpected_list";
    /// Row indices of the partial list; null where the backend has none.
    pub const PARTIAL_UNEXPECTED_INDEX_LIST: &str = "partial_unexpected_index_list";
    /// `{value, count}` pairs over the unexpected values, most frequent first.
    pub const PARTIAL_UNEXPECTED_COUNTS: &str = "partial_unexpected_counts";
    /// Every unexpected value (`COMPLETE` only).
    pub const UNEXPECTED_LIST: &str = "unexpected_list";
    /// Every unexpected row index (`COMPLETE` only); null where the backend has none.
    pub const UNEXPECTED_INDEX_LIST: &str = "unexpected_index_list";
    /// Every unexpected row as a full record (`COMPLETE` only).
    pub const UNEXPECTED_ROWS: &str = "unexpected_rows";
}

/// The computed statistics of a validation result.
///
/// Which fields are present depends on the verbosity tier. A field that is
/// present may still be `null` (e.g. `unexpected_percent` over zero rows);
/// a field that is absent was not computed at this tier or could not be.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultDetails(Map<String, Value>);

impl ResultDetails {
    /// Creates empty details.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// A field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the field is present (possibly null).
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// `element_count`, if present and non-null.
    pub fn element_count(&self) -> Option<u64> {
        self.get(fields::ELEMENT_COUNT).and_then(Value::as_u64)
    }

    /// `unexpected_count`, if present and non-null.
    pub fn unexpected_count(&self) -> Option<u64> {
        self.get(fields::UNEXPECTED_COUNT).and_then(Value::as_u64)
    }

    /// `unexpected_percent`, if present and non-null.
    pub fn unexpected_percent(&self) -> Option<f64> {
        self.get(fields::UNEXPECTED_PERCENT).and_then(Value::as_f64)
    }

    /// `missing_count`, if present and non-null.
    pub fn missing_count(&self) -> Option<u64> {
        self.get(fields::MISSING_COUNT).and_then(Value::as_u64)
    }

    /// `partial_unexpected_list`, if present.
    pub fn partial_unexpected_list(&self) -> Option<&Vec<Value>> {
        self.get(fields::PARTIAL_UNEXPECTED_LIST)
            .and_then(Value::as_array)
    }

    /// `partial_unexpected_counts`, if present.
    pub fn partial_unexpected_counts(&self) -> Option<&Vec<Value>> {
        self.get(fields::PARTIAL_UNEXPECTED_COUNTS)
            .and_then(Value::as_array)
    }

    /// `unexpected_list`, if present.
    pub fn unexpected_list(&self) -> Option<&Vec<Value>> {
        self.get(fields::UNEXPECTED_LIST).and_then(Value::as_array)
    }
}

/// Details of an error caught while validating one expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Whether an error was raised
    pub raised_exception: bool,
    /// Kind of error (e.g. `MetricResolutionError`)
    pub exception_type: String,
    /// Error message
    pub exception_message: String,
}

impl ExceptionInfo {
    /// Captures an engine error.
    pub fn from_error(err: &crate::error::ExpectError) -> Self {
        Self {
            raised_exception: true,
            exception_type: err.kind().to_string(),
            exception_message: err.to_string(),
        }
    }
}

/// The outcome of validating one expectation against one batch.
///
/// `success` is `None` when the outcome is undefined, e.g. when the column
/// has no non-null values to judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationValidationResult {
    /// Pass, fail, or undefined
    pub success: Option<bool>,
    /// Statistics; absent at BOOLEAN_ONLY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultDetails>,
    /// The configuration that was validated, when `include_config` is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_config: Option<ExpectationConfiguration>,
    /// Populated when an error was caught instead of propagated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_info: Option<ExceptionInfo>,
    /// Meta copied from the configuration
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ExpectationValidationResult {
    /// Creates a result with the given success and details.
    pub fn new(success: Option<bool>, result: Option<ResultDetails>) -> Self {
        Self {
            success,
            result,
            expectation_config: None,
            exception_info: None,
            meta: Map::new(),
        }
    }

    /// Creates a failed result recording a caught error.
    pub fn from_error(err: &crate::error::ExpectError) -> Self {
        Self {
            success: Some(false),
            result: None,
            expectation_config: None,
            exception_info: Some(ExceptionInfo::from_error(err)),
            meta: Map::new(),
        }
    }

    /// Returns true if the expectation passed.
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// Returns true if an error was caught for this expectation.
    pub fn raised_exception(&self) -> bool {
        self.exception_info
            .as_ref()
            .is_some_and(|info| info.raised_exception)
    }
}

/// Aggregate counts over a suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    /// Expectations that were validated
    pub evaluated_expectations: usize,
    /// Expectations with `success == true`
    pub successful_expectations: usize,
    /// Expectations with `success == false`
    pub unsuccessful_expectations: usize,
    /// Successful share in percent; `None` when nothing was evaluated
    pub success_percent: Option<f64>,
}

impl ValidationStatistics {
    /// Computes statistics over expectation results.
    pub fn from_results(results: &[ExpectationValidationResult]) -> Self {
        let evaluated_expectations = results.len();
        let successful_expectations = results.iter().filter(|r| r.success == Some(true)).count();
        let unsuccessful_expectations = results.iter().filter(|r| r.success == Some(false)).count();
        let success_percent = (evaluated_expectations > 0)
            .then(|| successful_expectations as f64 / evaluated_expectations as f64 * 100.0);
        Self {
            evaluated_expectations,
            successful_expectations,
            unsuccessful_expectations,
            success_percent,
        }
    }
}

/// The outcome of validating a whole suite against one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteValidationResult {
    /// Suite that was run
    pub suite_name: String,
    /// Batch the suite ran against
    pub batch_id: BatchId,
    /// True when every expectation succeeded
    pub success: bool,
    /// Per-expectation results in suite order
    pub results: Vec<ExpectationValidationResult>,
    /// Aggregate counts
    pub statistics: ValidationStatistics,
    /// When the run started
    pub run_time: DateTime<Utc>,
}

impl SuiteValidationResult {
    /// Serializes the result as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
