//! Property-based tests for expect-guard.
//!
//! These exercise the result formatter and the validator over generated
//! inputs:
//!
//! - Verbosity tiers only ever add fields
//! - `mostly` is honored exactly at the threshold
//! - `partial_unexpected_counts` is bounded, sorted and consistent with its input
//! - The in-memory and SQL engines agree on counts, including over NaN and
//!   infinite values

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use expect_guard::config::RuntimeConfiguration;
use expect_guard::core::{Batch, ExpectationConfiguration, ResultFormat, VerbosityTier};
use expect_guard::engine::{InMemoryExecutionEngine, SqlExecutionEngine};
use expect_guard::expectations::map_expectation_success;
use expect_guard::formatter::{format_map_output, partial_unexpected_counts, MapOutput};
use expect_guard::validator::Validator;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Test Data Generation Utilities
// ============================================================================

/// A single-column string batch. `short` values pass a 1..=3 length check,
/// `long` values fail it, `None` rows are null.
fn length_batch(cells: &[Option<bool>]) -> Batch {
    let values: Vec<Option<&str>> = cells
        .iter()
        .map(|cell| cell.map(|short| if short { "ok" } else { "too long" }))
        .collect();
    let schema = Arc::new(Schema::new(vec![Field::new("code", DataType::Utf8, true)]));
    let records =
        RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values))]).unwrap();
    Batch::from_records("generated", records)
}

fn lengths(mostly: f64) -> ExpectationConfiguration {
    ExpectationConfiguration::new("expect_column_value_lengths_to_be_between")
        .with_kwarg("column", json!("code"))
        .with_kwarg("min_value", json!(1))
        .with_kwarg("max_value", json!(3))
        .with_kwarg("mostly", json!(mostly))
}

fn readings_batch(values: &[Option<f64>]) -> Batch {
    let schema = Arc::new(Schema::new(vec![Field::new("reading", DataType::Float64, true)]));
    let records = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(values.to_vec()))],
    )
    .unwrap();
    Batch::from_records("readings", records)
}

/// Finite readings mixed with NaN, both infinities and nulls.
fn readings() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(
        prop_oneof![
            4 => (-100.0f64..100.0).prop_map(Some),
            1 => Just(Some(f64::NAN)),
            1 => Just(Some(f64::INFINITY)),
            1 => Just(Some(f64::NEG_INFINITY)),
            1 => Just(None),
        ],
        1..40,
    )
}

/// `expect_column_values_to_be_between` with a lower bound, an upper bound
/// or both, each optionally strict.
fn between_config() -> impl Strategy<Value = ExpectationConfiguration> {
    (-60i32..60, 0i32..80, 0u8..3, any::<bool>(), any::<bool>()).prop_map(
        |(low, width, sides, strict_min, strict_max)| {
            let mut config = ExpectationConfiguration::new("expect_column_values_to_be_between")
                .with_kwarg("column", json!("reading"))
                .with_kwarg("strict_min", json!(strict_min))
                .with_kwarg("strict_max", json!(strict_max));
            let (min, max) = (f64::from(low) / 2.0, f64::from(low + width) / 2.0);
            if sides != 2 {
                config = config.with_kwarg("min_value", json!(min));
            }
            if sides != 1 {
                config = config.with_kwarg("max_value", json!(max));
            }
            config
        },
    )
}

fn small_values() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(
        prop_oneof![
            (0i64..5).prop_map(|v| json!(v)),
            "[a-c]".prop_map(Value::String),
            Just(Value::Null),
        ],
        0..40,
    )
}

// ============================================================================
// Formatter Properties
// ============================================================================

proptest! {
    /// Each tier's result keys are a superset of the tier below it, and
    /// success never depends on the tier.
    #[test]
    fn test_tiers_only_add_fields(
        unexpected in small_values(),
        extra_rows in 0u64..20,
        nulls in 0u64..5,
        cap in 0usize..25,
    ) {
        let unexpected_count = unexpected.len() as u64;
        let element_count = unexpected_count + extra_rows + nulls;
        let nonnull = element_count - nulls;
        let indices: Vec<Value> = (0..unexpected.len()).map(|i| json!(i)).collect();
        let output = MapOutput {
            success: map_expectation_success(unexpected_count, Some(nonnull).filter(|n| *n > 0), 0.9),
            element_count,
            nonnull_count: Some(nonnull).filter(|n| *n > 0),
            unexpected_count,
            unexpected_list: &unexpected,
            unexpected_index_list: Some(&indices),
            unexpected_rows: None,
        };

        let tiers = [
            VerbosityTier::BooleanOnly,
            VerbosityTier::Basic,
            VerbosityTier::Summary,
            VerbosityTier::Complete,
        ];
        let mut previous: HashSet<String> = HashSet::new();
        for tier in tiers {
            let format = ResultFormat::new(tier).with_partial_unexpected_count(cap);
            let result = format_map_output(&format, &output);
            prop_assert_eq!(result.success, output.success);

            let keys: HashSet<String> = result
                .result
                .map(|details| details.keys().map(str::to_string).collect())
                .unwrap_or_default();
            prop_assert!(previous.is_subset(&keys), "{:?} dropped fields of the tier below", tier);
            previous = keys;
        }
    }

    /// Counts are sorted by count descending, capped, and never exceed the
    /// occurrences in the input.
    #[test]
    fn test_partial_counts_are_bounded_and_sorted(
        values in small_values(),
        cap in 0usize..10,
    ) {
        let counts = partial_unexpected_counts(&values, cap);
        prop_assert!(counts.len() <= cap);

        let mut previous = u64::MAX;
        for entry in &counts {
            let count = entry["count"].as_u64().unwrap();
            let occurrences = values.iter().filter(|v| **v == entry["value"]).count() as u64;
            prop_assert_eq!(count, occurrences);
            prop_assert!(count <= previous);
            previous = count;
        }
    }
}

// ============================================================================
// Validator Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Success is exactly `1 - unexpected / nonnull >= mostly`; undefined when
    /// every value is null.
    #[test]
    fn test_mostly_threshold_property(
        cells in prop::collection::vec(prop::option::of(any::<bool>()), 0..60),
        mostly in 0.0f64..=1.0,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(async {
            Validator::builtin()
                .unwrap()
                .validate(
                    &lengths(mostly),
                    &InMemoryExecutionEngine::new(),
                    &length_batch(&cells),
                    &RuntimeConfiguration::new(),
                )
                .await
                .unwrap()
        });

        let nonnull = cells.iter().filter(|c| c.is_some()).count() as u64;
        let unexpected = cells.iter().filter(|c| **c == Some(false)).count() as u64;
        let expected = if nonnull == 0 {
            None
        } else if mostly >= 1.0 {
            Some(unexpected == 0)
        } else {
            Some(1.0 - unexpected as f64 / nonnull as f64 >= mostly)
        };
        prop_assert_eq!(result.success, expected);

        let details = result.result.unwrap();
        prop_assert_eq!(details.element_count(), Some(cells.len() as u64));
        prop_assert_eq!(details.unexpected_count(), Some(unexpected));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Both engines report the same counts and success for the same batch.
    #[test]
    fn test_engines_agree(
        cells in prop::collection::vec(prop::option::of(any::<bool>()), 1..40),
        mostly in 0.0f64..=1.0,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (memory, sql) = rt.block_on(async {
            let validator = Validator::builtin().unwrap();
            let batch = length_batch(&cells);
            let runtime = RuntimeConfiguration::new();
            let memory = validator
                .validate(&lengths(mostly), &InMemoryExecutionEngine::new(), &batch, &runtime)
                .await
                .unwrap();
            let sql = validator
                .validate(&lengths(mostly), &SqlExecutionEngine::new(), &batch, &runtime)
                .await
                .unwrap();
            (memory, sql)
        });

        prop_assert_eq!(memory.success, sql.success);
        let (memory, sql) = (memory.result.unwrap(), sql.result.unwrap());
        prop_assert_eq!(memory.element_count(), sql.element_count());
        prop_assert_eq!(memory.unexpected_count(), sql.unexpected_count());
        prop_assert_eq!(memory.missing_count(), sql.missing_count());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// NaN fails every bound and infinities compare as numbers on both
    /// engines; unexpected values are listed in the same order.
    #[test]
    fn test_engines_agree_on_non_finite_values(
        values in readings(),
        config in between_config(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (memory, sql) = rt.block_on(async {
            let validator = Validator::builtin().unwrap();
            let batch = readings_batch(&values);
            let runtime = RuntimeConfiguration::new();
            let memory = validator
                .validate(&config, &InMemoryExecutionEngine::new(), &batch, &runtime)
                .await
                .unwrap();
            let sql = validator
                .validate(&config, &SqlExecutionEngine::new(), &batch, &runtime)
                .await
                .unwrap();
            (memory, sql)
        });

        prop_assert!(!memory.raised_exception());
        prop_assert!(!sql.raised_exception());
        prop_assert_eq!(memory.success, sql.success);
        let (memory, sql) = (memory.result.unwrap(), sql.result.unwrap());
        prop_assert_eq!(memory.unexpected_count(), sql.unexpected_count());
        prop_assert_eq!(memory.missing_count(), sql.missing_count());
        prop_assert_eq!(memory.partial_unexpected_list(), sql.partial_unexpected_list());

        let nan_count = values.iter().flatten().filter(|v| v.is_nan()).count() as u64;
        prop_assert!(memory.unexpected_count().unwrap() >= nan_count);
    }
}
