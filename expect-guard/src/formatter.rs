//! Shaping column-map outcomes into tiered validation results.
//!
//! Tiers are strictly additive:
//!
//! | tier | adds |
//! |---|---|
//! | `BOOLEAN_ONLY` | `success` only |
//! | `BASIC` | counts, percentages, `partial_unexpected_list` |
//! | `SUMMARY` | `partial_unexpected_index_list`, `partial_unexpected_counts` (cap > 0) |
//! | `COMPLETE` | `unexpected_list`, `unexpected_index_list`, `unexpected_rows` |
//!
//! # Examples
//!
//! ```rust
//! use expect_guard::core::{ResultFormat, VerbosityTier};
//! use expect_guard::formatter::{format_map_output, MapOutput};
//! use serde_json::json;
//!
//! let unexpected = vec![json!("dddd")];
//! let output = MapOutput {
//!     success: Some(false),
//!     element_count: 4,
//!     nonnull_count: Some(4),
//!     unexpected_count: 1,
//!     unexpected_list: &unexpected,
//!     unexpected_index_list: None,
//!     unexpected_rows: None,
//! };
//!
//! let result = format_map_output(&ResultFormat::new(VerbosityTier::Basic), &output);
//! assert_eq!(result.result.unwrap().unexpected_percent(), Some(25.0));
//! ```

use crate::core::{
    fields, ExpectationValidationResult, ResultDetails, ResultFormat, Row, VerbosityTier,
};
use serde_json::{json, Value};
use std::cmp::Ordering;

/// Entry used in place of `partial_unexpected_counts` when values cannot be grouped.
pub const UNHASHABLE_SENTINEL: &str = "partial_exception_counts requires a hashable type";

/// Everything a column-map expectation computed, before shaping.
#[derive(Debug, Clone, Copy)]
pub struct MapOutput<'a> {
    /// Pass, fail, or undefined
    pub success: Option<bool>,
    /// Rows in the domain
    pub element_count: u64,
    /// Non-null rows in the domain; `None` when unknown
    pub nonnull_count: Option<u64>,
    /// Rows failing the condition
    pub unexpected_count: u64,
    /// Values of the failing rows
    pub unexpected_list: &'a [Value],
    /// Batch indices of the failing rows, when the backend has them
    pub unexpected_index_list: Option<&'a [Value]>,
    /// Full records of the failing rows, when requested
    pub unexpected_rows: Option<&'a [Row]>,
}

/// Builds the result for the requested tier.
///
/// Never fails: fields whose inputs are unknown are omitted or null.
pub fn format_map_output(format: &ResultFormat, output: &MapOutput<'_>) -> ExpectationValidationResult {
    if format.tier == VerbosityTier::BooleanOnly {
        return ExpectationValidationResult::new(output.success, None);
    }

    let cap = format.partial_unexpected_count;
    let element_count = output.element_count;
    let unexpected_count = output.unexpected_count;
    let mut details = ResultDetails::new();

    details.insert(fields::ELEMENT_COUNT, json!(element_count));
    details.insert(fields::UNEXPECTED_COUNT, json!(unexpected_count));
    details.insert(
        fields::UNEXPECTED_PERCENT,
        percent(unexpected_count, element_count),
    );
    details.insert(
        fields::PARTIAL_UNEXPECTED_LIST,
        Value::Array(truncated(output.unexpected_list, cap)),
    );

    if let Some(nonnull_count) = output.nonnull_count {
        let missing_count = element_count.saturating_sub(nonnull_count);
        details.insert(fields::MISSING_COUNT, json!(missing_count));
        details.insert(fields::MISSING_PERCENT, percent(missing_count, element_count));
        let nonmissing = if element_count > 0 {
            percent(unexpected_count, nonnull_count)
        } else {
            Value::Null
        };
        details.insert(fields::UNEXPECTED_PERCENT_NONMISSING, nonmissing);
    }

    if format.tier >= VerbosityTier::Summary && cap > 0 {
        details.insert(
            fields::PARTIAL_UNEXPECTED_INDEX_LIST,
            output
                .unexpected_index_list
                .map(|indices| Value::Array(truncated(indices, cap)))
                .unwrap_or(Value::Null),
        );
        details.insert(
            fields::PARTIAL_UNEXPECTED_COUNTS,
            Value::Array(partial_unexpected_counts(output.unexpected_list, cap)),
        );
    }

    if format.tier == VerbosityTier::Complete {
        details.insert(
            fields::UNEXPECTED_LIST,
            Value::Array(output.unexpected_list.to_vec()),
        );
        details.insert(
            fields::UNEXPECTED_INDEX_LIST,
            output
                .unexpected_index_list
                .map(|indices| Value::Array(indices.to_vec()))
                .unwrap_or(Value::Null),
        );
        if let Some(rows) = output.unexpected_rows {
            details.insert(
                fields::UNEXPECTED_ROWS,
                Value::Array(rows.iter().cloned().map(Value::Object).collect()),
            );
        }
    }

    ExpectationValidationResult::new(output.success, Some(details))
}

/// The most frequent distinct values as `{value, count}` entries, count
/// descending then value ascending, at most `cap` of them.
///
/// Arrays and objects cannot be grouped; the result is then a single
/// [`UNHASHABLE_SENTINEL`] entry.
pub fn partial_unexpected_counts(values: &[Value], cap: usize) -> Vec<Value> {
    if values
        .iter()
        .any(|v| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        return vec![Value::String(UNHASHABLE_SENTINEL.to_string())];
    }

    let mut sorted: Vec<&Value> = values.iter().collect();
    sorted.sort_by(|a, b| compare_values(a, b));

    let mut groups: Vec<(&Value, u64)> = Vec::new();
    for value in sorted {
        match groups.last_mut() {
            Some((last, count)) if compare_values(last, value) == Ordering::Equal => *count += 1,
            _ => groups.push((value, 1)),
        }
    }
    // stable: equal counts stay in value order
    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups.truncate(cap);

    groups
        .into_iter()
        .map(|(value, count)| json!({"value": value, "count": count}))
        .collect()
}

fn percent(part: u64, whole: u64) -> Value {
    if whole == 0 {
        Value::Null
    } else {
        json!(part as f64 / whole as f64 * 100.0)
    }
}

fn truncated(values: &[Value], cap: usize) -> Vec<Value> {
    values.iter().take(cap).cloned().collect()
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over scalar JSON values: null < bool < number < string.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or(f64::NAN)
                    .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
