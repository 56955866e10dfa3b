//! The metric registry: metric definitions plus one provider per backend.

use super::node::MetricConfiguration;
use crate::core::{Batch, MetricValue};
use crate::engine::{
    domain_rows, engine_of, Backend, DomainRows, ExecutionEngine, MetricDomain, SqlExecutionEngine,
};
use crate::error::{ExpectError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Declares the metrics a metric needs, keyed by dependency name.
pub type DependencyFn =
    Arc<dyn Fn(&MetricConfiguration) -> Vec<(String, MetricConfiguration)> + Send + Sync>;

/// The backend-independent part of a metric: its name, the kwargs it reads and
/// the metrics it depends on.
#[derive(Clone)]
pub struct MetricDefinition {
    name: String,
    domain_keys: Vec<String>,
    value_keys: Vec<String>,
    dependencies: Option<DependencyFn>,
}

impl fmt::Debug for MetricDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDefinition")
            .field("name", &self.name)
            .field("domain_keys", &self.domain_keys)
            .field("value_keys", &self.value_keys)
            .field("has_dependencies", &self.dependencies.is_some())
            .finish()
    }
}

impl MetricDefinition {
    /// A metric with no kwargs and no dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain_keys: Vec::new(),
            value_keys: Vec::new(),
            dependencies: None,
        }
    }

    /// Sets the domain kwargs the metric reads.
    pub fn with_domain_keys(mut self, keys: &[&str]) -> Self {
        self.domain_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Sets the value kwargs the metric reads.
    pub fn with_value_keys(mut self, keys: &[&str]) -> Self {
        self.value_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Declares the metric's own dependencies.
    pub fn with_dependencies<F>(mut self, dependencies: F) -> Self
    where
        F: Fn(&MetricConfiguration) -> Vec<(String, MetricConfiguration)> + Send + Sync + 'static,
    {
        self.dependencies = Some(Arc::new(dependencies));
        self
    }

    /// Metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Domain kwargs the metric reads.
    pub fn domain_keys(&self) -> &[String] {
        &self.domain_keys
    }

    /// Value kwargs the metric reads.
    pub fn value_keys(&self) -> &[String] {
        &self.value_keys
    }

    /// The dependencies of one request of this metric.
    pub fn dependencies_for(&self, metric: &MetricConfiguration) -> Vec<(String, MetricConfiguration)> {
        self.dependencies
            .as_ref()
            .map(|deps| deps(metric))
            .unwrap_or_default()
    }

    /// Builds a request from an expectation's domain and success kwargs,
    /// keeping only the keys this metric declares.
    pub fn configuration_for(
        &self,
        domain_kwargs: &Map<String, Value>,
        success_kwargs: &Map<String, Value>,
    ) -> MetricConfiguration {
        MetricConfiguration::new(
            self.name.clone(),
            select(domain_kwargs, &self.domain_keys),
            select(success_kwargs, &self.value_keys),
        )
    }
}

fn select(kwargs: &Map<String, Value>, keys: &[String]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| kwargs.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

/// What a provider receives: the engine, the batch, the request and the
/// already-resolved values of the dependencies it declared.
#[derive(Debug, Clone)]
pub struct MetricRequest<'a> {
    /// Active engine
    pub engine: &'a dyn ExecutionEngine,
    /// Batch under validation
    pub batch: &'a Batch,
    /// The metric being computed
    pub metric: &'a MetricConfiguration,
    /// Resolved dependencies by dependency name
    pub dependencies: HashMap<String, &'a MetricValue>,
}

impl<'a> MetricRequest<'a> {
    /// The decoded domain.
    pub fn domain(&self) -> Result<MetricDomain> {
        MetricDomain::from_kwargs(self.metric.domain_kwargs())
    }

    /// A value kwarg.
    pub fn value_kwarg(&self, key: &str) -> Option<&Value> {
        self.metric.value_kwarg(key)
    }

    /// A numeric value kwarg; absent means `None`.
    pub fn f64_kwarg(&self, key: &str) -> Result<Option<f64>> {
        match self.value_kwarg(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                ExpectError::type_mismatch(format!("number for '{key}'"), v.to_string())
            }),
        }
    }

    /// A boolean value kwarg with a default.
    pub fn bool_kwarg(&self, key: &str, default: bool) -> Result<bool> {
        match self.value_kwarg(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(v) => Err(ExpectError::type_mismatch(
                format!("boolean for '{key}'"),
                v.to_string(),
            )),
        }
    }

    /// A required string value kwarg.
    pub fn str_kwarg(&self, key: &str) -> Result<&str> {
        match self.value_kwarg(key) {
            Some(Value::String(s)) => Ok(s),
            Some(v) => Err(ExpectError::type_mismatch(
                format!("string for '{key}'"),
                v.to_string(),
            )),
            None => Err(ExpectError::Internal(format!(
                "metric '{}' requires value kwarg '{key}'",
                self.metric.name()
            ))),
        }
    }

    /// A resolved dependency.
    pub fn dependency(&self, name: &str) -> Result<&'a MetricValue> {
        self.dependencies.get(name).copied().ok_or_else(|| {
            ExpectError::Internal(format!(
                "metric '{}' is missing resolved dependency '{name}'",
                self.metric.name()
            ))
        })
    }

    /// The domain's rows on an in-memory batch.
    pub fn records(&self) -> Result<DomainRows> {
        domain_rows(self.batch, &self.domain()?)
    }

    /// The SQL engine, for SQL providers.
    pub fn sql(&self) -> Result<&'a SqlExecutionEngine> {
        engine_of(self.engine)
    }
}

/// Computes one metric on one backend.
#[async_trait]
pub trait MetricProvider: Send + Sync + fmt::Debug {
    /// Computes the metric value.
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue>;
}

#[derive(Debug, Clone)]
struct RegisteredProvider {
    provider: Arc<dyn MetricProvider>,
    implementation: &'static str,
}

/// Maps metric names to definitions and `(name, backend)` to providers.
///
/// Built once, then shared read-only across runs.
///
/// # Examples
///
/// ```rust
/// use expect_guard::engine::Backend;
/// use expect_guard::metrics::{MetricDefinition, MetricRegistry};
///
/// let mut registry = MetricRegistry::new();
/// registry
///     .define(MetricDefinition::new("my.metric").with_domain_keys(&["column"]))
///     .unwrap();
/// expect_guard::metrics::builtin::table::register(&mut registry).unwrap();
///
/// assert!(registry.definition("my.metric").is_ok());
/// assert!(registry.supports("table.row_count", &Backend::InMemory));
/// assert!(registry.lookup("table.row_count", &Backend::Custom("spark".into())).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    definitions: HashMap<String, MetricDefinition>,
    providers: HashMap<(String, Backend), RegisteredProvider>,
}

impl MetricRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a metric definition. Redefining a metric with the same kwargs is
    /// a no-op; with different kwargs it is an error.
    pub fn define(&mut self, definition: MetricDefinition) -> Result<()> {
        if let Some(existing) = self.definitions.get(definition.name()) {
            if existing.domain_keys == definition.domain_keys
                && existing.value_keys == definition.value_keys
                && existing.dependencies.is_some() == definition.dependencies.is_some()
            {
                return Ok(());
            }
            return Err(ExpectError::DuplicateMetric {
                metric: definition.name,
                backend: "definition".to_string(),
            });
        }
        self.definitions
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Registers the provider of a metric for a backend.
    ///
    /// Registering the same provider type again is a no-op; a different type
    /// for the same `(metric, backend)` pair fails with `DuplicateMetric`.
    pub fn register<P>(&mut self, metric: &str, backend: Backend, provider: P) -> Result<()>
    where
        P: MetricProvider + 'static,
    {
        let implementation = std::any::type_name::<P>();
        let key = (metric.to_string(), backend);

        if let Some(existing) = self.providers.get(&key) {
            if existing.implementation == implementation {
                return Ok(());
            }
            return Err(ExpectError::DuplicateMetric {
                metric: key.0,
                backend: key.1.to_string(),
            });
        }

        if !self.definitions.contains_key(metric) {
            self.definitions
                .insert(metric.to_string(), MetricDefinition::new(metric));
        }

        debug!(metric.name = metric, backend = %key.1, implementation, "Registered metric provider");
        self.providers.insert(
            key,
            RegisteredProvider {
                provider: Arc::new(provider),
                implementation,
            },
        );
        Ok(())
    }

    /// The provider of a metric for a backend.
    pub fn lookup(&self, metric: &str, backend: &Backend) -> Result<Arc<dyn MetricProvider>> {
        self.providers
            .get(&(metric.to_string(), backend.clone()))
            .map(|registered| Arc::clone(&registered.provider))
            .ok_or_else(|| ExpectError::metric_not_found(metric, backend))
    }

    /// The definition of a metric.
    pub fn definition(&self, metric: &str) -> Result<&MetricDefinition> {
        self.definitions.get(metric).ok_or_else(|| ExpectError::MetricNotFound {
            metric: metric.to_string(),
            backend: "any".to_string(),
        })
    }

    /// Whether a backend can compute the metric.
    pub fn supports(&self, metric: &str, backend: &Backend) -> bool {
        self.providers
            .contains_key(&(metric.to_string(), backend.clone()))
    }

    /// All defined metric names, sorted.
    pub fn metric_names(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self.definitions.keys().map(String::as_str).collect();
        names.into_iter().collect()
    }

    /// Backends a metric is implemented for.
    pub fn backends_for(&self, metric: &str) -> Vec<Backend> {
        let mut backends: Vec<Backend> = self
            .providers
            .keys()
            .filter(|(name, _)| name == metric)
            .map(|(_, backend)| backend.clone())
            .collect();
        backends.sort();
        backends
    }
}
