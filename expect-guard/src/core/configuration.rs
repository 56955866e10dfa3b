//! Expectation configurations and suites.
//!
//! Configurations arrive from outside the engine, usually deserialized from a
//! persisted suite. The engine only requires `expectation_type` and a flat
//! `kwargs` map of JSON values.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named assertion type plus its keyword parameters.
///
/// # Examples
///
/// ```rust
/// use expect_guard::core::ExpectationConfiguration;
/// use serde_json::json;
///
/// let config = ExpectationConfiguration::new("expect_column_values_to_match_regex")
///     .with_kwarg("column", json!("email"))
///     .with_kwarg("regex", json!("@"))
///     .with_kwarg("mostly", json!(0.9));
///
/// assert_eq!(config.kwarg("column"), Some(&json!("email")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationConfiguration {
    expectation_type: String,
    #[serde(default)]
    kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    meta: Map<String, Value>,
}

impl ExpectationConfiguration {
    /// Creates a configuration with no kwargs.
    pub fn new(expectation_type: impl Into<String>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs: Map::new(),
            meta: Map::new(),
        }
    }

    /// Creates a configuration from an existing kwargs map.
    pub fn with_kwargs(expectation_type: impl Into<String>, kwargs: Map<String, Value>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs,
            meta: Map::new(),
        }
    }

    /// Sets a single kwarg.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// Sets a meta entry. Meta is carried through to results untouched.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Parses a configuration from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The assertion type name.
    pub fn expectation_type(&self) -> &str {
        &self.expectation_type
    }

    /// All kwargs.
    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }

    /// A single kwarg, if present.
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// The opaque meta map.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }
}

/// A named collection of expectation configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSuite {
    expectation_suite_name: String,
    #[serde(default)]
    expectations: Vec<ExpectationConfiguration>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    meta: Map<String, Value>,
}

impl ExpectationSuite {
    /// Creates an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            expectation_suite_name: name.into(),
            expectations: Vec::new(),
            meta: Map::new(),
        }
    }

    /// Appends an expectation.
    pub fn expectation(mut self, configuration: ExpectationConfiguration) -> Self {
        self.expectations.push(configuration);
        self
    }

    /// Parses a suite from persisted suite JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The suite name.
    pub fn name(&self) -> &str {
        &self.expectation_suite_name
    }

    /// The configurations in declaration order.
    pub fn expectations(&self) -> &[ExpectationConfiguration] {
        &self.expectations
    }

    /// The suite meta map.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }
}
