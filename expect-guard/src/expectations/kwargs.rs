//! Layered expectation kwargs.

use super::Expectation;
use crate::config::{RuntimeConfiguration, ValidatorConfig, RUNTIME_KEYS};
use crate::core::{ExpectationConfiguration, ResultFormat};
use crate::error::{ExpectError, Result};
use serde_json::{Map, Value};

/// The kwargs of one configuration after layering runtime overrides,
/// configuration kwargs, expectation defaults and validator defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationKwargs {
    expectation_type: String,
    domain: Map<String, Value>,
    success: Map<String, Value>,
    result_format: ResultFormat,
    catch_exceptions: bool,
    include_config: bool,
}

impl ExpectationKwargs {
    /// Layers and splits the kwargs of `configuration` for `expectation`.
    ///
    /// Fails when the configuration is for another expectation type, when a
    /// kwarg is neither a domain, success nor runtime key, when a runtime key
    /// has the wrong type, or when `result_format` is unknown.
    pub fn resolve(
        expectation: &dyn Expectation,
        configuration: &ExpectationConfiguration,
        runtime: &RuntimeConfiguration,
        defaults: &ValidatorConfig,
    ) -> Result<Self> {
        let expectation_type = expectation.expectation_type();
        if configuration.expectation_type() != expectation_type {
            return Err(ExpectError::invalid_configuration(
                configuration.expectation_type(),
                format!("configuration type does not match expectation type '{expectation_type}'"),
            ));
        }

        let domain_keys = expectation.domain_keys();
        let success_keys = expectation.success_keys();
        if let Some(unknown) = configuration.kwargs().keys().find(|key| {
            let key = key.as_str();
            !domain_keys.contains(&key) && !success_keys.contains(&key) && !RUNTIME_KEYS.contains(&key)
        }) {
            return Err(ExpectError::invalid_configuration(
                expectation_type,
                format!("unexpected kwarg '{unknown}'"),
            ));
        }

        let expectation_defaults = expectation.default_kwargs();
        let layered = |keys: &[&'static str]| -> Map<String, Value> {
            keys.iter()
                .filter_map(|key| {
                    configuration
                        .kwarg(key)
                        .or_else(|| expectation_defaults.get(*key))
                        .filter(|value| !value.is_null())
                        .map(|value| (key.to_string(), value.clone()))
                })
                .collect()
        };
        let runtime_value = |key: &str| {
            runtime
                .get(key)
                .or_else(|| configuration.kwarg(key))
                .or_else(|| expectation_defaults.get(key))
                .filter(|value| !value.is_null())
        };
        let runtime_flag = |key: &str, fallback: bool| -> Result<bool> {
            match runtime_value(key) {
                None => Ok(fallback),
                Some(Value::Bool(flag)) => Ok(*flag),
                Some(other) => Err(ExpectError::invalid_configuration(
                    expectation_type,
                    format!("'{key}' must be a boolean, got {other}"),
                )),
            }
        };

        Ok(Self {
            expectation_type: expectation_type.to_string(),
            domain: layered(domain_keys),
            success: layered(success_keys),
            result_format: match runtime_value("result_format") {
                Some(value) => ResultFormat::parse(value)?,
                None => defaults.result_format,
            },
            catch_exceptions: runtime_flag("catch_exceptions", defaults.catch_exceptions)?,
            include_config: runtime_flag("include_config", defaults.include_config)?,
        })
    }

    /// Whether errors for this configuration should be recorded rather than
    /// propagated. Never fails: malformed values fall back to the next layer.
    pub fn catch_exceptions_for(
        configuration: &ExpectationConfiguration,
        runtime: &RuntimeConfiguration,
        defaults: &ValidatorConfig,
    ) -> bool {
        runtime
            .get("catch_exceptions")
            .and_then(Value::as_bool)
            .or_else(|| configuration.kwarg("catch_exceptions").and_then(Value::as_bool))
            .unwrap_or(defaults.catch_exceptions)
    }

    /// The expectation type these kwargs were resolved for.
    pub fn expectation_type(&self) -> &str {
        &self.expectation_type
    }

    /// Domain kwargs.
    pub fn domain(&self) -> &Map<String, Value> {
        &self.domain
    }

    /// Success kwargs.
    pub fn success(&self) -> &Map<String, Value> {
        &self.success
    }

    /// A domain or success kwarg.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.success.get(key).or_else(|| self.domain.get(key))
    }

    /// The effective result format.
    pub fn result_format(&self) -> &ResultFormat {
        &self.result_format
    }

    /// Whether errors are recorded instead of propagated.
    pub fn catch_exceptions(&self) -> bool {
        self.catch_exceptions
    }

    /// Whether the configuration is attached to the result.
    pub fn include_config(&self) -> bool {
        self.include_config
    }

    /// An `InvalidConfiguration` error for this expectation.
    pub fn invalid(&self, message: impl Into<String>) -> ExpectError {
        ExpectError::invalid_configuration(&self.expectation_type, message)
    }

    /// A required string kwarg.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(self.invalid(format!("'{key}' must be a string, got {other}"))),
            None => Err(self.invalid(format!("'{key}' parameter is required"))),
        }
    }

    /// An optional numeric kwarg.
    pub fn optional_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(format!("'{key}' must be a number, got {value}"))),
        }
    }

    /// An optional boolean kwarg.
    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(other) => Err(self.invalid(format!("'{key}' must be a boolean, got {other}"))),
        }
    }

    /// `mostly`, defaulting to 1.0; must be a number in `[0, 1]`.
    pub fn mostly(&self) -> Result<f64> {
        let mostly = self.optional_f64("mostly")?.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&mostly) {
            return Err(self.invalid(format!("'mostly' must be between 0 and 1, got {mostly}")));
        }
        Ok(mostly)
    }
}
