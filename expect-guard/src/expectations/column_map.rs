//! Column-map expectations: a per-row condition plus a `mostly` threshold.

use super::{
    map_expectation_success, Expectation, ExpectationKwargs, ExpectationMetrics,
    ValidationDependencies,
};
use crate::core::{ExpectationValidationResult, VerbosityTier};
use crate::engine::Backend;
use crate::error::Result;
use crate::formatter::{format_map_output, MapOutput};
use crate::metrics::builtin::nonnull::NONNULL;
use crate::metrics::builtin::table::ROW_COUNT;
use crate::metrics::column_map::{
    derived, UNEXPECTED_COUNT, UNEXPECTED_INDEX_LIST, UNEXPECTED_ROWS, UNEXPECTED_VALUES,
};
use crate::metrics::{MetricConfiguration, MetricRegistry};
use serde_json::{json, Map, Value};

/// Expectation-specific kwarg validation, run after the column-map checks.
pub type ConfigurationCheck = fn(&ExpectationKwargs) -> Result<()>;

/// An expectation that holds when at least `mostly` of the non-null values
/// of `column` satisfy a condition metric.
///
/// The dependency set grows with the verbosity tier:
///
/// | tier | metrics |
/// |---|---|
/// | all | `<condition>.unexpected_count`, `column_values.nonnull.unexpected_count`, `table.row_count` |
/// | `BASIC`+ | `<condition>.unexpected_values` |
/// | `SUMMARY`+ | `<condition>.unexpected_index_list` where the backend has one |
/// | `COMPLETE` | `<condition>.unexpected_rows` |
///
/// # Examples
///
/// ```rust
/// use expect_guard::expectations::ColumnMapExpectation;
///
/// let expectation = ColumnMapExpectation::new(
///     "expect_column_values_to_be_present",
///     "column_values.nonnull",
/// );
/// assert_eq!(expectation.condition(), "column_values.nonnull");
/// ```
#[derive(Debug, Clone)]
pub struct ColumnMapExpectation {
    expectation_type: &'static str,
    condition: &'static str,
    success_keys: Vec<&'static str>,
    defaults: Map<String, Value>,
    check: Option<ConfigurationCheck>,
}

impl ColumnMapExpectation {
    /// A column-map expectation over `condition` with only `mostly` as a
    /// success kwarg.
    pub fn new(expectation_type: &'static str, condition: &'static str) -> Self {
        let mut defaults = Map::new();
        defaults.insert("mostly".to_string(), json!(1.0));
        Self {
            expectation_type,
            condition,
            success_keys: vec!["mostly"],
            defaults,
            check: None,
        }
    }

    /// Adds success kwargs. They are passed to the condition metric when it
    /// declares them as value kwargs.
    pub fn with_success_keys(mut self, keys: &[&'static str]) -> Self {
        self.success_keys.extend_from_slice(keys);
        self
    }

    /// Sets the default of a kwarg.
    pub fn with_default(mut self, key: &str, value: Value) -> Self {
        self.defaults.insert(key.to_string(), value);
        self
    }

    /// Sets the expectation-specific kwarg validation.
    pub fn with_check(mut self, check: ConfigurationCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// The condition metric name.
    pub fn condition(&self) -> &str {
        self.condition
    }

    fn request(
        &self,
        metrics: &MetricRegistry,
        name: &str,
        kwargs: &ExpectationKwargs,
    ) -> Result<MetricConfiguration> {
        Ok(metrics
            .definition(name)?
            .configuration_for(kwargs.domain(), kwargs.success()))
    }
}

impl Expectation for ColumnMapExpectation {
    fn expectation_type(&self) -> &str {
        self.expectation_type
    }

    fn success_keys(&self) -> &[&'static str] {
        &self.success_keys
    }

    fn default_kwargs(&self) -> Map<String, Value> {
        self.defaults.clone()
    }

    fn validate_configuration(&self, kwargs: &ExpectationKwargs) -> Result<()> {
        kwargs
            .require_str("column")
            .map_err(|_| kwargs.invalid("'column' parameter is required for column map expectations"))?;
        kwargs.mostly()?;
        if let Some(check) = self.check {
            check(kwargs)?;
        }
        Ok(())
    }

    fn validation_dependencies(
        &self,
        kwargs: &ExpectationKwargs,
        backend: &Backend,
        metrics: &MetricRegistry,
    ) -> Result<ValidationDependencies> {
        let tier = kwargs.result_format().tier;
        let mut names = vec![
            derived(self.condition, UNEXPECTED_COUNT),
            derived(NONNULL, UNEXPECTED_COUNT),
            ROW_COUNT.to_string(),
        ];
        if tier >= VerbosityTier::Basic {
            names.push(derived(self.condition, UNEXPECTED_VALUES));
        }
        let index_list = derived(self.condition, UNEXPECTED_INDEX_LIST);
        if tier >= VerbosityTier::Summary && metrics.supports(&index_list, backend) {
            names.push(index_list);
        }
        if tier == VerbosityTier::Complete {
            names.push(derived(self.condition, UNEXPECTED_ROWS));
        }

        let mut dependencies = ValidationDependencies::new();
        for name in names {
            let metric = self.request(metrics, &name, kwargs)?;
            dependencies.set(name, metric);
        }
        Ok(dependencies)
    }

    fn validate(
        &self,
        kwargs: &ExpectationKwargs,
        metrics: &ExpectationMetrics<'_>,
    ) -> Result<ExpectationValidationResult> {
        let unexpected_count = metrics.count(&derived(self.condition, UNEXPECTED_COUNT))?;
        let null_count = metrics.count(&derived(NONNULL, UNEXPECTED_COUNT))?;
        let element_count = metrics.count(ROW_COUNT)?;

        let nonnull = element_count.saturating_sub(null_count);
        let nonnull_count = (nonnull > 0).then_some(nonnull);
        let success = map_expectation_success(unexpected_count, nonnull_count, kwargs.mostly()?);

        let unexpected_list = metrics
            .list(&derived(self.condition, UNEXPECTED_VALUES))?
            .unwrap_or_default();
        let unexpected_index_list = metrics.list(&derived(self.condition, UNEXPECTED_INDEX_LIST))?;
        let unexpected_rows = metrics.rows(&derived(self.condition, UNEXPECTED_ROWS))?;

        Ok(format_map_output(
            kwargs.result_format(),
            &MapOutput {
                success,
                element_count,
                nonnull_count,
                unexpected_count,
                unexpected_list,
                unexpected_index_list,
                unexpected_rows,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeConfiguration, ValidatorConfig};
    use crate::core::{fields, ExpectationConfiguration, MetricValue, ResultFormat};
    use crate::metrics::builtin::register_all;
    use crate::metrics::builtin::values_between::VALUES_BETWEEN;

    const TYPE: &str = "expect_column_values_to_be_between";

    fn expectation() -> ColumnMapExpectation {
        ColumnMapExpectation::new(TYPE, VALUES_BETWEEN)
            .with_success_keys(&["min_value", "max_value", "strict_min", "strict_max"])
    }

    fn kwargs(tier: VerbosityTier) -> ExpectationKwargs {
        let config = ExpectationConfiguration::new(TYPE)
            .with_kwarg("column", json!("age"))
            .with_kwarg("min_value", json!(0))
            .with_kwarg("mostly", json!(0.5));
        let runtime = RuntimeConfiguration::new().with_result_format(ResultFormat::new(tier));
        ExpectationKwargs::resolve(&expectation(), &config, &runtime, &ValidatorConfig::default())
            .unwrap()
    }

    fn dependency_names(tier: VerbosityTier, backend: Backend) -> Vec<String> {
        let mut registry = MetricRegistry::new();
        register_all(&mut registry).unwrap();
        expectation()
            .validation_dependencies(&kwargs(tier), &backend, &registry)
            .unwrap()
            .names()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_dependencies_grow_with_tier() {
        let base = dependency_names(VerbosityTier::BooleanOnly, Backend::InMemory);
        assert_eq!(
            base,
            vec![
                "column_values.between.unexpected_count",
                "column_values.nonnull.unexpected_count",
                "table.row_count",
            ]
        );
        assert_eq!(dependency_names(VerbosityTier::Basic, Backend::InMemory).len(), 4);
        assert_eq!(dependency_names(VerbosityTier::Summary, Backend::InMemory).len(), 5);
        assert_eq!(dependency_names(VerbosityTier::Summary, Backend::Sql).len(), 4);
        assert_eq!(dependency_names(VerbosityTier::Complete, Backend::InMemory).len(), 6);
        assert_eq!(dependency_names(VerbosityTier::Complete, Backend::Sql).len(), 5);
    }

    #[test]
    fn test_metric_kwargs_follow_declared_keys() {
        let mut registry = MetricRegistry::new();
        register_all(&mut registry).unwrap();
        let dependencies = expectation()
            .validation_dependencies(&kwargs(VerbosityTier::Basic), &Backend::InMemory, &registry)
            .unwrap();

        let count = dependencies
            .get("column_values.between.unexpected_count")
            .unwrap();
        assert_eq!(count.value_kwarg("min_value"), Some(&json!(0)));
        assert_eq!(count.value_kwarg("mostly"), None);

        let row_count = dependencies.get("table.row_count").unwrap();
        assert!(row_count.domain_kwargs().get("column").is_none());
        assert!(row_count.value_kwargs().is_empty());
    }

    #[test]
    fn test_validate_from_metric_values() {
        let unexpected = MetricValue::Long(2);
        let nulls = MetricValue::Long(0);
        let rows = MetricValue::Long(10);
        let values = MetricValue::List(vec![json!(-1), json!(-2)]);
        let metrics = ExpectationMetrics::from_values([
            ("column_values.between.unexpected_count".to_string(), &unexpected),
            ("column_values.nonnull.unexpected_count".to_string(), &nulls),
            ("table.row_count".to_string(), &rows),
            ("column_values.between.unexpected_values".to_string(), &values),
        ]);

        let result = expectation()
            .validate(&kwargs(VerbosityTier::Basic), &metrics)
            .unwrap();
        assert_eq!(result.success, Some(true));
        let details = result.result.unwrap();
        assert_eq!(details.unexpected_percent(), Some(20.0));
        assert_eq!(details.get(fields::MISSING_COUNT), Some(&json!(0)));
    }

    #[test]
    fn test_all_null_column_is_undefined() {
        let unexpected = MetricValue::Long(0);
        let nulls = MetricValue::Long(3);
        let rows = MetricValue::Long(3);
        let values = MetricValue::List(Vec::new());
        let metrics = ExpectationMetrics::from_values([
            ("column_values.between.unexpected_count".to_string(), &unexpected),
            ("column_values.nonnull.unexpected_count".to_string(), &nulls),
            ("table.row_count".to_string(), &rows),
            ("column_values.between.unexpected_values".to_string(), &values),
        ]);

        let result = expectation()
            .validate(&kwargs(VerbosityTier::Basic), &metrics)
            .unwrap();
        assert_eq!(result.success, None);
        let details = result.result.unwrap();
        assert!(!details.contains(fields::MISSING_COUNT));
        assert!(!details.contains(fields::MISSING_PERCENT));
    }

    #[test]
    fn test_requires_column() {
        let config = ExpectationConfiguration::new(TYPE).with_kwarg("min_value", json!(1));
        let kwargs = ExpectationKwargs::resolve(
            &expectation(),
            &config,
            &RuntimeConfiguration::new(),
            &ValidatorConfig::default(),
        )
        .unwrap();
        let err = expectation().validate_configuration(&kwargs).unwrap_err();
        assert!(err.to_string().contains("'column' parameter is required"));
    }
}
