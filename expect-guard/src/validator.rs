//! Running expectations against a batch.
//!
//! [`Validator::graph_validate`] validates a list of configurations against
//! one batch. Each configuration goes through the same stages:
//!
//! ```text
//! kwargs layering ─▶ configuration check ─▶ dependency graph
//!                                                 │
//!        result ◀── expectation logic ◀── shared GraphResolver
//! ```
//!
//! The resolver is shared across the configurations of one call, so a metric
//! requested by several expectations is computed once.

use crate::config::{RuntimeConfiguration, ValidatorConfig};
use crate::core::{
    Batch, ExpectationConfiguration, ExpectationSuite, ExpectationValidationResult,
    SuiteValidationResult, ValidationStatistics,
};
use crate::engine::{Backend, ExecutionEngine};
use crate::error::{ExpectError, Result};
use crate::expectations::{ExpectationKwargs, ExpectationMetrics, Registry};
use crate::metrics::{DependencyGraph, GraphBuilder, GraphResolver};
use crate::{log_expectation, log_metric, perf_debug};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Validates expectation configurations against batches.
///
/// # Examples
///
/// ```rust
/// use expect_guard::config::RuntimeConfiguration;
/// use expect_guard::core::{Batch, ExpectationConfiguration};
/// use expect_guard::engine::InMemoryExecutionEngine;
/// use expect_guard::validator::Validator;
/// use arrow::array::StringArray;
/// use arrow::datatypes::{DataType, Field, Schema};
/// use arrow::record_batch::RecordBatch;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> expect_guard::error::Result<()> {
/// let schema = Arc::new(Schema::new(vec![Field::new("code", DataType::Utf8, true)]));
/// let records = RecordBatch::try_new(
///     schema,
///     vec![Arc::new(StringArray::from(vec!["a", "bb", "ccc", "dddd"]))],
/// )?;
/// let batch = Batch::from_records("codes", records);
///
/// let config = ExpectationConfiguration::new("expect_column_value_lengths_to_be_between")
///     .with_kwarg("column", json!("code"))
///     .with_kwarg("min_value", json!(1))
///     .with_kwarg("max_value", json!(3));
///
/// let validator = Validator::builtin()?;
/// let result = validator
///     .validate(&config, &InMemoryExecutionEngine::new(), &batch, &RuntimeConfiguration::new())
///     .await?;
/// assert_eq!(result.success, Some(false));
/// assert_eq!(result.result.unwrap().unexpected_percent(), Some(25.0));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<Registry>,
    config: ValidatorConfig,
}

impl Validator {
    /// A validator over the given registry with default configuration.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            config: ValidatorConfig::default(),
        }
    }

    /// A validator over the process-wide built-in registry.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Registry::builtin()?))
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// The registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validates a single configuration. Errors propagate unless
    /// `catch_exceptions` is on for it.
    pub async fn validate(
        &self,
        configuration: &ExpectationConfiguration,
        engine: &dyn ExecutionEngine,
        batch: &Batch,
        runtime: &RuntimeConfiguration,
    ) -> Result<ExpectationValidationResult> {
        let mut results = self
            .graph_validate(std::slice::from_ref(configuration), engine, batch, runtime)
            .await?;
        results
            .pop()
            .ok_or_else(|| ExpectError::Internal("no result for configuration".into()))
    }

    /// Validates configurations against one batch, in order.
    ///
    /// A configuration whose validation fails is recorded as a failed result
    /// with `exception_info` when `catch_exceptions` is on for it; otherwise
    /// the error aborts the call.
    #[instrument(skip(self, configurations, engine, batch, runtime), fields(
        batch.id = %batch.id(),
        backend = %engine.backend(),
        expectations = configurations.len()
    ))]
    pub async fn graph_validate(
        &self,
        configurations: &[ExpectationConfiguration],
        engine: &dyn ExecutionEngine,
        batch: &Batch,
        runtime: &RuntimeConfiguration,
    ) -> Result<Vec<ExpectationValidationResult>> {
        engine.prepare(batch).await?;

        let mut resolver = GraphResolver::new(self.registry.metrics());
        let mut results = Vec::with_capacity(configurations.len());

        for configuration in configurations {
            match self
                .validate_one(configuration, engine, batch, runtime, &mut resolver)
                .await
            {
                Ok(result) => results.push(result),
                Err(e)
                    if ExpectationKwargs::catch_exceptions_for(
                        configuration,
                        runtime,
                        &self.config,
                    ) =>
                {
                    warn!(
                        expectation_type = configuration.expectation_type(),
                        error.kind = e.kind(),
                        error = %e,
                        "Expectation raised; recording and continuing"
                    );
                    results.push(self.caught(configuration, runtime, &e));
                }
                Err(e) => return Err(e),
            }
        }

        perf_debug!(
            self.config.log,
            metrics.resolved = resolver.resolved().len(),
            "Finished graph validation"
        );
        Ok(results)
    }

    /// Validates a suite against one batch.
    #[instrument(skip(self, suite, engine, batch, runtime), fields(
        suite.name = %suite.name(),
        suite.expectations = suite.expectations().len(),
        batch.id = %batch.id()
    ))]
    pub async fn validate_suite(
        &self,
        suite: &ExpectationSuite,
        engine: &dyn ExecutionEngine,
        batch: &Batch,
        runtime: &RuntimeConfiguration,
    ) -> Result<SuiteValidationResult> {
        info!(
            suite.name = %suite.name(),
            suite.expectations = suite.expectations().len(),
            "Starting expectation suite"
        );
        let run_time = Utc::now();
        let start = Instant::now();

        let results = self
            .graph_validate(suite.expectations(), engine, batch, runtime)
            .await?;
        let statistics = ValidationStatistics::from_results(&results);
        let success = results.iter().all(|r| r.success == Some(true));

        info!(
            suite.name = %suite.name(),
            suite.success = success,
            expectations.successful = statistics.successful_expectations,
            expectations.unsuccessful = statistics.unsuccessful_expectations,
            duration_ms = start.elapsed().as_millis() as u64,
            "Expectation suite completed"
        );

        Ok(SuiteValidationResult {
            suite_name: suite.name().to_string(),
            batch_id: batch.id().clone(),
            success,
            results,
            statistics,
            run_time,
        })
    }

    /// The combined dependency graph of several configurations.
    ///
    /// Identical metric requests collapse to one node.
    pub fn build_graph(
        &self,
        configurations: &[ExpectationConfiguration],
        backend: &Backend,
        runtime: &RuntimeConfiguration,
    ) -> Result<DependencyGraph> {
        let mut builder = GraphBuilder::new(self.registry.metrics());
        for configuration in configurations {
            let expectation = self
                .registry
                .expectations()
                .get(configuration.expectation_type())?;
            let kwargs = ExpectationKwargs::resolve(expectation, configuration, runtime, &self.config)?;
            expectation.validate_configuration(&kwargs)?;
            let dependencies =
                expectation.validation_dependencies(&kwargs, backend, self.registry.metrics())?;
            builder.add_all(kwargs.expectation_type(), dependencies.metrics())?;
        }
        Ok(builder.build())
    }

    async fn validate_one(
        &self,
        configuration: &ExpectationConfiguration,
        engine: &dyn ExecutionEngine,
        batch: &Batch,
        runtime: &RuntimeConfiguration,
        resolver: &mut GraphResolver<'_>,
    ) -> Result<ExpectationValidationResult> {
        let expectation = self
            .registry
            .expectations()
            .get(configuration.expectation_type())?;
        let kwargs = ExpectationKwargs::resolve(expectation, configuration, runtime, &self.config)?;
        expectation.validate_configuration(&kwargs)?;

        let dependencies =
            expectation.validation_dependencies(&kwargs, &engine.backend(), self.registry.metrics())?;
        let mut builder = GraphBuilder::new(self.registry.metrics());
        let ids = builder.add_all(kwargs.expectation_type(), dependencies.metrics())?;
        let graph = builder.build();

        let stats = resolver.resolve(&graph, engine, batch).await?;
        log_metric!(
            self.config.log,
            expectation_type = kwargs.expectation_type(),
            metrics.computed = stats.computed,
            metrics.cached = stats.cached,
            "Resolved expectation metrics"
        );

        let metrics = ExpectationMetrics::from_resolved(&ids, resolver.resolved())?;
        let mut result = expectation.validate(&kwargs, &metrics)?;
        if kwargs.include_config() {
            result.expectation_config = Some(configuration.clone());
        }
        result.meta = configuration.meta().clone();

        log_expectation!(
            self.config.log,
            expectation_type = kwargs.expectation_type(),
            success = ?result.success,
            "Validated expectation"
        );
        Ok(result)
    }

    fn caught(
        &self,
        configuration: &ExpectationConfiguration,
        runtime: &RuntimeConfiguration,
        error: &ExpectError,
    ) -> ExpectationValidationResult {
        let include_config = runtime
            .get("include_config")
            .or_else(|| configuration.kwarg("include_config"))
            .and_then(Value::as_bool)
            .unwrap_or(self.config.include_config);

        let mut result = ExpectationValidationResult::from_error(error);
        if include_config {
            result.expectation_config = Some(configuration.clone());
        }
        result.meta = configuration.meta().clone();
        result
    }
}
