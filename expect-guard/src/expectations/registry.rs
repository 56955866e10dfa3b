//! Expectation lookup by type name, and the combined registry a validator runs against.

use super::{builtin, Expectation};
use crate::error::{ExpectError, Result};
use crate::metrics::{self, MetricRegistry};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps expectation type names to expectations.
#[derive(Debug, Clone, Default)]
pub struct ExpectationRegistry {
    expectations: HashMap<String, Arc<dyn Expectation>>,
}

impl ExpectationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an expectation under its type name.
    pub fn register<E>(&mut self, expectation: E) -> Result<()>
    where
        E: Expectation + 'static,
    {
        let expectation_type = expectation.expectation_type().to_string();
        if self.expectations.contains_key(&expectation_type) {
            return Err(ExpectError::DuplicateExpectation(expectation_type));
        }
        debug!(expectation_type = %expectation_type, "Registered expectation");
        self.expectations
            .insert(expectation_type, Arc::new(expectation));
        Ok(())
    }

    /// The expectation registered under `expectation_type`.
    pub fn get(&self, expectation_type: &str) -> Result<&dyn Expectation> {
        self.expectations
            .get(expectation_type)
            .map(|expectation| expectation.as_ref())
            .ok_or_else(|| ExpectError::UnknownExpectation(expectation_type.to_string()))
    }

    /// Whether a type name is registered.
    pub fn contains(&self, expectation_type: &str) -> bool {
        self.expectations.contains_key(expectation_type)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.expectations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered expectations.
    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }
}

static BUILTIN: OnceCell<Arc<Registry>> = OnceCell::new();

/// Metrics plus expectations. Built once, then shared read-only.
///
/// # Examples
///
/// ```rust
/// use expect_guard::expectations::{ColumnMapExpectation, Registry};
///
/// let registry = Registry::builtin().unwrap();
/// assert!(registry
///     .expectations()
///     .contains("expect_column_values_to_match_regex"));
///
/// // Packages extend a private copy.
/// let mut custom = Registry::with_builtins().unwrap();
/// custom
///     .expectations_mut()
///     .register(ColumnMapExpectation::new(
///         "expect_column_values_to_not_be_null",
///         "column_values.nonnull",
///     ))
///     .unwrap();
/// assert_eq!(custom.expectations().len(), 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    metrics: MetricRegistry,
    expectations: ExpectationRegistry,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh registry holding the built-in metrics and expectations.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        metrics::builtin::register_all(&mut registry.metrics)?;
        builtin::register_all(&mut registry.expectations)?;
        Ok(registry)
    }

    /// The process-wide built-in registry, built on first use.
    pub fn builtin() -> Result<Arc<Registry>> {
        BUILTIN
            .get_or_try_init(|| Self::with_builtins().map(Arc::new))
            .cloned()
    }

    /// Metric definitions and providers.
    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    /// Mutable access for registering metrics.
    pub fn metrics_mut(&mut self) -> &mut MetricRegistry {
        &mut self.metrics
    }

    /// Registered expectations.
    pub fn expectations(&self) -> &ExpectationRegistry {
        &self.expectations
    }

    /// Mutable access for registering expectations.
    pub fn expectations_mut(&mut self) -> &mut ExpectationRegistry {
        &mut self.expectations
    }
}
