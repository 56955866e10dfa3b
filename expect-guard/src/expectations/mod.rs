//! Expectations: named assertions evaluated over resolved metrics.
//!
//! An expectation does three things, each a method of [`Expectation`]:
//!
//! 1. checks its kwargs ([`Expectation::validate_configuration`])
//! 2. declares the metrics it needs ([`Expectation::validation_dependencies`])
//! 3. turns the resolved metrics into a result ([`Expectation::validate`])
//!
//! Expectations are looked up by type name in an [`ExpectationRegistry`];
//! packages add their own by registering them, no central edits needed.
//!
//! ## Built-in expectations
//!
//! | expectation | condition metric |
//! |---|---|
//! | `expect_column_value_lengths_to_be_between` | `column_values.value_length_between` |
//! | `expect_column_values_to_match_regex` | `column_values.match_regex` |
//! | `expect_column_value_z_scores_to_be_less_than` | `column_values.z_score.under_threshold` |
//! | `expect_column_values_to_be_between` | `column_values.between` |

pub mod builtin;
mod column_map;
mod kwargs;
mod registry;

pub use column_map::{ColumnMapExpectation, ConfigurationCheck};
pub use kwargs::ExpectationKwargs;
pub use registry::{ExpectationRegistry, Registry};

use crate::core::{ExpectationValidationResult, MetricValue, Row};
use crate::engine::{Backend, DOMAIN_KEYS};
use crate::error::{ExpectError, Result};
use crate::metrics::{MetricConfiguration, MetricId, MetricRegistry, ResolvedMetrics};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A validating assertion type.
///
/// Implementations are stateless; the configuration being validated arrives
/// as layered [`ExpectationKwargs`].
pub trait Expectation: Send + Sync + fmt::Debug {
    /// The registered type name, e.g. `expect_column_values_to_match_regex`.
    fn expectation_type(&self) -> &str;

    /// Kwargs that select the data.
    fn domain_keys(&self) -> &[&'static str] {
        &DOMAIN_KEYS
    }

    /// Kwargs that parameterize the check.
    fn success_keys(&self) -> &[&'static str];

    /// Values used for domain and success keys the configuration leaves unset.
    fn default_kwargs(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Rejects malformed kwargs before any metric is requested.
    fn validate_configuration(&self, kwargs: &ExpectationKwargs) -> Result<()>;

    /// The metrics this configuration needs on the given backend.
    fn validation_dependencies(
        &self,
        kwargs: &ExpectationKwargs,
        backend: &Backend,
        metrics: &MetricRegistry,
    ) -> Result<ValidationDependencies>;

    /// Evaluates the resolved metrics.
    fn validate(
        &self,
        kwargs: &ExpectationKwargs,
        metrics: &ExpectationMetrics<'_>,
    ) -> Result<ExpectationValidationResult>;
}

/// Metric requests of one expectation, keyed by dependency name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationDependencies {
    metrics: BTreeMap<String, MetricConfiguration>,
}

impl ValidationDependencies {
    /// No dependencies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a dependency.
    pub fn set(&mut self, name: impl Into<String>, metric: MetricConfiguration) {
        self.metrics.insert(name.into(), metric);
    }

    /// A dependency by name.
    pub fn get(&self, name: &str) -> Option<&MetricConfiguration> {
        self.metrics.get(name)
    }

    /// Dependency names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// All requests keyed by name.
    pub fn metrics(&self) -> &BTreeMap<String, MetricConfiguration> {
        &self.metrics
    }

    /// Number of dependencies.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether nothing is needed.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// The resolved values an expectation asked for, by dependency name.
#[derive(Debug, Clone, Default)]
pub struct ExpectationMetrics<'a> {
    values: BTreeMap<String, &'a MetricValue>,
}

impl<'a> ExpectationMetrics<'a> {
    /// Picks the values of `ids` out of a run's resolved metrics.
    pub fn from_resolved(
        ids: &BTreeMap<String, MetricId>,
        resolved: &'a ResolvedMetrics,
    ) -> Result<Self> {
        let values = ids
            .iter()
            .map(|(name, id)| {
                resolved
                    .get(id)
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| {
                        ExpectError::Internal(format!("dependency '{name}' ({id}) was not resolved"))
                    })
            })
            .collect::<Result<_>>()?;
        Ok(Self { values })
    }

    /// Builds the view directly from values.
    pub fn from_values(values: impl IntoIterator<Item = (String, &'a MetricValue)>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// A required value.
    pub fn get(&self, name: &str) -> Result<&'a MetricValue> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| ExpectError::Internal(format!("metric dependency '{name}' is missing")))
    }

    /// An optional value.
    pub fn optional(&self, name: &str) -> Option<&'a MetricValue> {
        self.values.get(name).copied()
    }

    /// A required count.
    pub fn count(&self, name: &str) -> Result<u64> {
        self.get(name)?.expect_count()
    }

    /// Optional unexpected records; absent when the metric was not requested.
    pub fn rows(&self, name: &str) -> Result<Option<&'a [Row]>> {
        match self.optional(name) {
            None => Ok(None),
            Some(MetricValue::Rows(rows)) => Ok(Some(rows.as_slice())),
            Some(value) => Err(ExpectError::type_mismatch("rows", value.type_name())),
        }
    }

    /// An optional list; absent when the metric was not requested.
    pub fn list(&self, name: &str) -> Result<Option<&'a [Value]>> {
        match self.optional(name) {
            None => Ok(None),
            Some(value) => value
                .as_list()
                .map(Some)
                .ok_or_else(|| ExpectError::type_mismatch("list", value.type_name())),
        }
    }
}

/// Whether a column-map expectation holds.
///
/// `None` (undefined) when there are no non-null values to judge. With
/// `mostly >= 1.0` every non-null value must be expected; otherwise the
/// expected share must reach `mostly`.
///
/// # Examples
///
/// ```rust
/// use expect_guard::expectations::map_expectation_success;
///
/// assert_eq!(map_expectation_success(2, Some(10), 0.8), Some(true));
/// assert_eq!(map_expectation_success(2, Some(10), 0.81), Some(false));
/// assert_eq!(map_expectation_success(0, Some(0), 1.0), None);
/// ```
pub fn map_expectation_success(unexpected: u64, nonnull: Option<u64>, mostly: f64) -> Option<bool> {
    let nonnull = nonnull.filter(|n| *n > 0)?;
    if mostly >= 1.0 {
        return Some(unexpected == 0);
    }
    Some(1.0 - unexpected as f64 / nonnull as f64 >= mostly)
}
