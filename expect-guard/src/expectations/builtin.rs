//! Built-in column-map expectations.

use super::{ColumnMapExpectation, ExpectationKwargs, ExpectationRegistry};
use crate::error::Result;
use crate::metrics::builtin::lengths::VALUE_LENGTH_BETWEEN;
use crate::metrics::builtin::regex_match::MATCH_REGEX;
use crate::metrics::builtin::statistics::Z_SCORE_UNDER_THRESHOLD;
use crate::metrics::builtin::values_between::VALUES_BETWEEN;
use regex::Regex;
use serde_json::json;

/// Type name of [`value_lengths_between`].
pub const EXPECT_COLUMN_VALUE_LENGTHS_TO_BE_BETWEEN: &str =
    "expect_column_value_lengths_to_be_between";
/// Type name of [`match_regex`].
pub const EXPECT_COLUMN_VALUES_TO_MATCH_REGEX: &str = "expect_column_values_to_match_regex";
/// Type name of [`z_scores_less_than`].
pub const EXPECT_COLUMN_VALUE_Z_SCORES_TO_BE_LESS_THAN: &str =
    "expect_column_value_z_scores_to_be_less_than";
/// Type name of [`values_between`].
pub const EXPECT_COLUMN_VALUES_TO_BE_BETWEEN: &str = "expect_column_values_to_be_between";

const BOUND_KEYS: [&str; 4] = ["min_value", "max_value", "strict_min", "strict_max"];

/// Registers every built-in expectation.
pub fn register_all(registry: &mut ExpectationRegistry) -> Result<()> {
    registry.register(value_lengths_between())?;
    registry.register(match_regex())?;
    registry.register(z_scores_less_than())?;
    registry.register(values_between())?;
    Ok(())
}

/// `expect_column_value_lengths_to_be_between`: character length within
/// integral `min_value`/`max_value`.
pub fn value_lengths_between() -> ColumnMapExpectation {
    ColumnMapExpectation::new(EXPECT_COLUMN_VALUE_LENGTHS_TO_BE_BETWEEN, VALUE_LENGTH_BETWEEN)
        .with_success_keys(&BOUND_KEYS)
        .with_default("strict_min", json!(false))
        .with_default("strict_max", json!(false))
        .with_check(|kwargs| {
            let (min, max) = check_bounds(kwargs)?;
            for (key, bound) in [("min_value", min), ("max_value", max)] {
                if bound.is_some_and(|b| b.fract() != 0.0) {
                    return Err(kwargs.invalid(format!("'{key}' must be an integer")));
                }
            }
            Ok(())
        })
}

/// `expect_column_values_to_match_regex`: values contain a match of `regex`.
pub fn match_regex() -> ColumnMapExpectation {
    ColumnMapExpectation::new(EXPECT_COLUMN_VALUES_TO_MATCH_REGEX, MATCH_REGEX)
        .with_success_keys(&["regex"])
        .with_check(|kwargs| {
            let pattern = kwargs.require_str("regex")?;
            Regex::new(pattern)
                .map_err(|e| kwargs.invalid(format!("'regex' does not compile: {e}")))?;
            Ok(())
        })
}

/// `expect_column_value_z_scores_to_be_less_than`: `|z| < threshold`, or
/// `z < threshold` when `double_sided` is false.
pub fn z_scores_less_than() -> ColumnMapExpectation {
    ColumnMapExpectation::new(
        EXPECT_COLUMN_VALUE_Z_SCORES_TO_BE_LESS_THAN,
        Z_SCORE_UNDER_THRESHOLD,
    )
    .with_success_keys(&["threshold", "double_sided"])
    .with_default("double_sided", json!(true))
    .with_check(|kwargs| {
        if kwargs.optional_f64("threshold")?.is_none() {
            return Err(kwargs.invalid("'threshold' parameter is required"));
        }
        kwargs.optional_bool("double_sided")?;
        Ok(())
    })
}

/// `expect_column_values_to_be_between`: numeric values within bounds.
pub fn values_between() -> ColumnMapExpectation {
    ColumnMapExpectation::new(EXPECT_COLUMN_VALUES_TO_BE_BETWEEN, VALUES_BETWEEN)
        .with_success_keys(&BOUND_KEYS)
        .with_default("strict_min", json!(false))
        .with_default("strict_max", json!(false))
        .with_check(|kwargs| check_bounds(kwargs).map(|_| ()))
}

fn check_bounds(kwargs: &ExpectationKwargs) -> Result<(Option<f64>, Option<f64>)> {
    let min = kwargs.optional_f64("min_value")?;
    let max = kwargs.optional_f64("max_value")?;
    kwargs.optional_bool("strict_min")?;
    kwargs.optional_bool("strict_max")?;
    match (min, max) {
        (None, None) => Err(kwargs.invalid("min_value and max_value cannot both be None")),
        (Some(min), Some(max)) if min > max => Err(kwargs.invalid(format!(
            "min_value ({min}) cannot be greater than max_value ({max})"
        ))),
        bounds => Ok(bounds),
    }
}
