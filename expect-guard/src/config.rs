//! Validator configuration and runtime overrides.
//!
//! Runtime keys are layered, highest precedence first:
//!
//! 1. [`RuntimeConfiguration`] passed to a validation call
//! 2. the expectation configuration's kwargs
//! 3. the expectation's own defaults
//! 4. [`ValidatorConfig`]

use crate::core::{ResultFormat, VerbosityTier};
use crate::error::{ExpectError, Result};
use crate::logging::LogConfig;
use serde_json::{Map, Value};

/// Kwargs that control how a result is produced rather than what is checked.
pub const RUNTIME_KEYS: [&str; 3] = ["include_config", "catch_exceptions", "result_format"];

/// Defaults applied to every validation run of a [`crate::validator::Validator`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    /// Verbosity of results when nothing else sets `result_format`
    pub result_format: ResultFormat,
    /// Record per-expectation errors instead of aborting the suite
    pub catch_exceptions: bool,
    /// Attach the validated configuration to each result
    pub include_config: bool,
    /// Logging behaviour
    pub log: LogConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            result_format: ResultFormat::default(),
            catch_exceptions: true,
            include_config: true,
            log: LogConfig::default(),
        }
    }
}

impl ValidatorConfig {
    /// Aborts on the first error and keeps results small.
    pub fn strict() -> Self {
        Self {
            result_format: ResultFormat::new(VerbosityTier::BooleanOnly),
            catch_exceptions: false,
            include_config: false,
            log: LogConfig::production(),
        }
    }

    /// Records errors and returns everything it can.
    pub fn lenient() -> Self {
        Self {
            result_format: ResultFormat::new(VerbosityTier::Complete),
            catch_exceptions: true,
            include_config: true,
            log: LogConfig::default(),
        }
    }

    /// Sets the default result format.
    pub fn with_result_format(mut self, result_format: ResultFormat) -> Self {
        self.result_format = result_format;
        self
    }

    /// Sets whether per-expectation errors are caught.
    pub fn with_catch_exceptions(mut self, catch_exceptions: bool) -> Self {
        self.catch_exceptions = catch_exceptions;
        self
    }

    /// Sets whether configurations are attached to results.
    pub fn with_include_config(mut self, include_config: bool) -> Self {
        self.include_config = include_config;
        self
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

/// Per-call overrides of the runtime keys.
///
/// # Examples
///
/// ```rust
/// use expect_guard::config::RuntimeConfiguration;
/// use serde_json::json;
///
/// let runtime = RuntimeConfiguration::from_json(&json!({"result_format": "SUMMARY"})).unwrap();
/// assert_eq!(runtime.get("result_format"), Some(&json!("SUMMARY")));
/// assert!(RuntimeConfiguration::from_json(&json!({"mostly": 0.5})).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfiguration {
    values: Map<String, Value>,
}

impl RuntimeConfiguration {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from a JSON object. Keys other than the runtime keys
    /// are rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ExpectError::invalid_configuration(
                "runtime_configuration",
                format!("expected an object, got {value}"),
            ));
        };
        let mut runtime = Self::new();
        for (key, value) in map {
            runtime = runtime.with(key, value.clone())?;
        }
        Ok(runtime)
    }

    /// Sets one override.
    pub fn with(mut self, key: &str, value: Value) -> Result<Self> {
        if !RUNTIME_KEYS.contains(&key) {
            return Err(ExpectError::invalid_configuration(
                "runtime_configuration",
                format!("'{key}' is not a runtime key"),
            ));
        }
        self.values.insert(key.to_string(), value);
        Ok(self)
    }

    /// Overrides `result_format`.
    pub fn with_result_format(mut self, result_format: ResultFormat) -> Self {
        self.values
            .insert("result_format".to_string(), result_format.to_json());
        self
    }

    /// Overrides `catch_exceptions`.
    pub fn with_catch_exceptions(mut self, catch_exceptions: bool) -> Self {
        self.values
            .insert("catch_exceptions".to_string(), Value::Bool(catch_exceptions));
        self
    }

    /// Overrides `include_config`.
    pub fn with_include_config(mut self, include_config: bool) -> Self {
        self.values
            .insert("include_config".to_string(), Value::Bool(include_config));
        self
    }

    /// An override, if set.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether no override is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
