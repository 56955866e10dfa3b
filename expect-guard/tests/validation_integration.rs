//! End-to-end validation against both execution engines.

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use expect_guard::config::{RuntimeConfiguration, ValidatorConfig};
use expect_guard::core::{
    fields, Batch, ExpectationConfiguration, ExpectationSuite, ResultFormat, SuiteValidationResult,
    VerbosityTier,
};
use expect_guard::engine::{ExecutionEngine, InMemoryExecutionEngine, SqlExecutionEngine};
use expect_guard::validator::Validator;
use serde_json::{json, Value};
use std::sync::Arc;

fn codes_batch(values: Vec<Option<&str>>) -> Batch {
    let schema = Arc::new(Schema::new(vec![Field::new("code", DataType::Utf8, true)]));
    let records =
        RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values))]).unwrap();
    Batch::from_records("codes", records)
}

fn orders_batch() -> Batch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("status", DataType::Utf8, true),
        Field::new("amount", DataType::Float64, true),
    ]));
    let records = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])),
            Arc::new(StringArray::from(vec![
                Some("shipped"),
                Some("pending"),
                Some("shipped"),
                None,
                Some("cancelled"),
            ])),
            Arc::new(Float64Array::from(vec![
                Some(10.0),
                Some(250.0),
                Some(30.0),
                Some(45.5),
                None,
            ])),
        ],
    )
    .unwrap();
    Batch::from_records("orders", records)
}

fn engines() -> Vec<Box<dyn ExecutionEngine>> {
    vec![
        Box::new(InMemoryExecutionEngine::new()),
        Box::new(SqlExecutionEngine::new()),
    ]
}

fn lengths(min: i64, max: i64) -> ExpectationConfiguration {
    ExpectationConfiguration::new("expect_column_value_lengths_to_be_between")
        .with_kwarg("column", json!("code"))
        .with_kwarg("min_value", json!(min))
        .with_kwarg("max_value", json!(max))
}

fn between(column: &str, min: f64, max: f64) -> ExpectationConfiguration {
    ExpectationConfiguration::new("expect_column_values_to_be_between")
        .with_kwarg("column", json!(column))
        .with_kwarg("min_value", json!(min))
        .with_kwarg("max_value", json!(max))
}

fn format(tier: VerbosityTier) -> RuntimeConfiguration {
    RuntimeConfiguration::new().with_result_format(ResultFormat::new(tier))
}

#[tokio::test]
async fn test_value_lengths_basic_result() {
    let validator = Validator::builtin().unwrap();
    let batch = codes_batch(vec![Some("a"), Some("bb"), Some("ccc"), Some("dddd")]);

    for engine in engines() {
        let result = validator
            .validate(&lengths(1, 3), engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();

        assert_eq!(result.success, Some(false), "{}", engine.backend());
        let details = result.result.unwrap();
        assert_eq!(details.element_count(), Some(4));
        assert_eq!(details.unexpected_count(), Some(1));
        assert_eq!(details.unexpected_percent(), Some(25.0));
        assert_eq!(details.get(fields::UNEXPECTED_PERCENT_NONMISSING), Some(&json!(25.0)));
        assert_eq!(details.get(fields::MISSING_COUNT), Some(&json!(0)));
        assert_eq!(details.partial_unexpected_list(), Some(&vec![json!("dddd")]));
        assert!(!details.contains(fields::PARTIAL_UNEXPECTED_COUNTS));
    }
}

#[tokio::test]
async fn test_nulls_are_excluded_from_percentages() {
    let validator = Validator::builtin().unwrap();
    let batch = codes_batch(vec![Some("a"), None, Some("ccccc"), None]);

    for engine in engines() {
        let result = validator
            .validate(&lengths(1, 3), engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();

        let details = result.result.unwrap();
        assert_eq!(details.element_count(), Some(4));
        assert_eq!(details.missing_count(), Some(2));
        assert_eq!(details.get(fields::MISSING_PERCENT), Some(&json!(50.0)));
        assert_eq!(details.unexpected_count(), Some(1));
        assert_eq!(details.unexpected_percent(), Some(25.0));
        assert_eq!(details.get(fields::UNEXPECTED_PERCENT_NONMISSING), Some(&json!(50.0)));
    }
}

#[tokio::test]
async fn test_all_null_column_has_undefined_success() {
    let validator = Validator::builtin().unwrap();
    let batch = codes_batch(vec![None, None, None]);

    for engine in engines() {
        let result = validator
            .validate(&lengths(1, 3), engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();
        assert_eq!(result.success, None, "{}", engine.backend());
        let details = result.result.unwrap();
        assert_eq!(details.unexpected_count(), Some(0));
        assert!(!details.contains(fields::MISSING_COUNT));
    }
}

#[tokio::test]
async fn test_mostly_threshold_is_inclusive() {
    let validator = Validator::builtin().unwrap();
    let batch = codes_batch(vec![Some("a"), Some("b"), Some("c"), Some("d"), Some("eeee")]);

    for engine in engines() {
        let at = validator
            .validate(
                &lengths(1, 3).with_kwarg("mostly", json!(0.8)),
                engine.as_ref(),
                &batch,
                &RuntimeConfiguration::new(),
            )
            .await
            .unwrap();
        assert_eq!(at.success, Some(true), "{}", engine.backend());

        let above = validator
            .validate(
                &lengths(1, 3).with_kwarg("mostly", json!(0.81)),
                engine.as_ref(),
                &batch,
                &RuntimeConfiguration::new(),
            )
            .await
            .unwrap();
        assert_eq!(above.success, Some(false), "{}", engine.backend());
    }
}

#[tokio::test]
async fn test_unknown_result_format() {
    let validator = Validator::builtin().unwrap();
    let batch = codes_batch(vec![Some("a")]);
    let runtime = RuntimeConfiguration::new()
        .with("result_format", json!("WEIRD"))
        .unwrap()
        .with_catch_exceptions(false);

    for engine in engines() {
        let err = validator
            .validate(&lengths(1, 3), engine.as_ref(), &batch, &runtime)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownResultFormatError");
    }
}

#[tokio::test]
async fn test_partial_unexpected_list_is_truncated() {
    let validator = Validator::builtin().unwrap();
    let values: Vec<Option<&str>> = (0..30).map(|_| Some("toolong")).collect();
    let batch = codes_batch(values);
    let runtime = RuntimeConfiguration::new().with_result_format(
        ResultFormat::new(VerbosityTier::Summary).with_partial_unexpected_count(5),
    );

    for engine in engines() {
        let result = validator
            .validate(&lengths(1, 3), engine.as_ref(), &batch, &runtime)
            .await
            .unwrap();
        let details = result.result.unwrap();
        assert_eq!(details.unexpected_count(), Some(30));
        assert_eq!(details.partial_unexpected_list().unwrap().len(), 5);
        assert_eq!(
            details.partial_unexpected_counts(),
            Some(&vec![json!({"value": "toolong", "count": 30})])
        );
    }
}

#[tokio::test]
async fn test_summary_index_list_depends_on_backend() {
    let validator = Validator::builtin().unwrap();
    let batch = orders_batch();
    let config = between("amount", 0.0, 100.0);

    let memory = validator
        .validate(&config, &InMemoryExecutionEngine::new(), &batch, &format(VerbosityTier::Summary))
        .await
        .unwrap();
    let details = memory.result.unwrap();
    assert_eq!(details.get(fields::PARTIAL_UNEXPECTED_INDEX_LIST), Some(&json!([1])));

    let sql = validator
        .validate(&config, &SqlExecutionEngine::new(), &batch, &format(VerbosityTier::Summary))
        .await
        .unwrap();
    let details = sql.result.unwrap();
    assert_eq!(details.get(fields::PARTIAL_UNEXPECTED_INDEX_LIST), Some(&Value::Null));
    assert_eq!(details.unexpected_count(), Some(1));
}

#[tokio::test]
async fn test_complete_lists_every_unexpected_value() {
    let validator = Validator::builtin().unwrap();
    let batch = orders_batch();

    for engine in engines() {
        let result = validator
            .validate(
                &between("amount", 20.0, 100.0),
                engine.as_ref(),
                &batch,
                &format(VerbosityTier::Complete),
            )
            .await
            .unwrap();
        let details = result.result.unwrap();
        // batch order on both engines
        assert_eq!(
            details.unexpected_list(),
            Some(&vec![json!(10.0), json!(250.0)]),
            "{}",
            engine.backend()
        );

        let rows = details.get(fields::UNEXPECTED_ROWS).and_then(Value::as_array).unwrap();
        let order_ids: Vec<&Value> = rows.iter().map(|row| &row["order_id"]).collect();
        assert_eq!(order_ids, vec![&json!(1), &json!(2)], "{}", engine.backend());
        assert_eq!(rows[1]["status"], json!("pending"));
    }
}

#[tokio::test]
async fn test_row_condition_narrows_domain() {
    let validator = Validator::builtin().unwrap();
    let batch = orders_batch();
    let config = between("amount", 0.0, 100.0)
        .with_kwarg("row_condition", json!("status == 'shipped'"));

    for engine in engines() {
        let result = validator
            .validate(&config, engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();
        assert_eq!(result.success, Some(true), "{}", engine.backend());
        assert_eq!(result.result.unwrap().element_count(), Some(2));
    }
}

#[tokio::test]
async fn test_sql_row_condition_requires_sql_engine() {
    let validator = Validator::builtin().unwrap();
    let batch = orders_batch();
    let config = between("amount", 0.0, 100.0)
        .with_kwarg("row_condition", json!("order_id IN (1, 3)"))
        .with_kwarg("condition_parser", json!("sql"));

    let result = validator
        .validate(&config, &SqlExecutionEngine::new(), &batch, &RuntimeConfiguration::new())
        .await
        .unwrap();
    assert_eq!(result.success, Some(true));
    assert_eq!(result.result.unwrap().element_count(), Some(2));

    let result = validator
        .validate(&config, &InMemoryExecutionEngine::new(), &batch, &RuntimeConfiguration::new())
        .await
        .unwrap();
    assert!(result.raised_exception());
}

#[tokio::test]
async fn test_z_scores_on_both_engines() {
    let validator = Validator::builtin().unwrap();
    let schema = Arc::new(Schema::new(vec![Field::new("value", DataType::Float64, true)]));
    let records = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(vec![Some(1.0), Some(2.0), None, Some(3.0)]))],
    )
    .unwrap();
    let batch = Batch::from_records("floats", records);
    let config = ExpectationConfiguration::new("expect_column_value_z_scores_to_be_less_than")
        .with_kwarg("column", json!("value"))
        .with_kwarg("threshold", json!(0.5));

    for engine in engines() {
        let result = validator
            .validate(&config, engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();
        assert_eq!(result.success, Some(false));
        let details = result.result.unwrap();
        assert_eq!(details.unexpected_count(), Some(2), "{}", engine.backend());
        assert_eq!(details.missing_count(), Some(1));
    }
}

fn readings_batch(values: Vec<Option<f64>>) -> Batch {
    let schema = Arc::new(Schema::new(vec![Field::new("reading", DataType::Float64, true)]));
    let records =
        RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(values))]).unwrap();
    Batch::from_records("readings", records)
}

#[tokio::test]
async fn test_non_finite_values_against_one_sided_bounds() {
    let validator = Validator::builtin().unwrap();
    let batch = readings_batch(vec![
        Some(30.0),
        Some(f64::NAN),
        Some(10.0),
        Some(f64::INFINITY),
        Some(f64::NEG_INFINITY),
        None,
    ]);
    let bounded = |key: &str| {
        ExpectationConfiguration::new("expect_column_values_to_be_between")
            .with_kwarg("column", json!("reading"))
            .with_kwarg(key, json!(25))
    };

    for engine in engines() {
        let result = validator
            .validate(&bounded("min_value"), engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();
        assert_eq!(result.success, Some(false));
        let details = result.result.unwrap();
        assert_eq!(details.unexpected_count(), Some(3), "{}", engine.backend());
        assert_eq!(details.missing_count(), Some(1));
        assert_eq!(
            details.partial_unexpected_list(),
            Some(&vec![json!("NaN"), json!(10.0), json!("-inf")]),
            "{}",
            engine.backend()
        );

        let result = validator
            .validate(&bounded("max_value"), engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();
        let details = result.result.unwrap();
        assert_eq!(details.unexpected_count(), Some(3), "{}", engine.backend());
        assert_eq!(
            details.partial_unexpected_list(),
            Some(&vec![json!(30.0), json!("NaN"), json!("inf")])
        );
    }
}

#[tokio::test]
async fn test_z_scores_with_non_finite_values() {
    let validator = Validator::builtin().unwrap();
    let config = ExpectationConfiguration::new("expect_column_value_z_scores_to_be_less_than")
        .with_kwarg("column", json!("reading"))
        .with_kwarg("threshold", json!(3));

    // A non-finite value makes the mean or deviation undefined, so no row
    // has a z-score under the threshold.
    for poison in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let batch = readings_batch(vec![Some(1.0), Some(2.0), Some(poison), Some(3.0), None]);
        for engine in engines() {
            let result = validator
                .validate(&config, engine.as_ref(), &batch, &RuntimeConfiguration::new())
                .await
                .unwrap();
            assert!(!result.raised_exception(), "{poison} on {}", engine.backend());
            assert_eq!(result.success, Some(false));
            let details = result.result.unwrap();
            assert_eq!(
                details.unexpected_count(),
                Some(4),
                "{poison} on {}",
                engine.backend()
            );
            assert_eq!(details.missing_count(), Some(1));
        }
    }
}

#[tokio::test]
async fn test_infinite_row_condition_literal() {
    let validator = Validator::builtin().unwrap();
    let batch = readings_batch(vec![Some(30.0), Some(f64::INFINITY), Some(40.0), None]);
    let config = ExpectationConfiguration::new("expect_column_values_to_be_between")
        .with_kwarg("column", json!("reading"))
        .with_kwarg("min_value", json!(0))
        .with_kwarg("row_condition", json!("reading < inf"));

    for engine in engines() {
        let result = validator
            .validate(&config, engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();
        assert!(!result.raised_exception(), "{}", engine.backend());
        assert_eq!(result.success, Some(true));
        assert_eq!(result.result.unwrap().element_count(), Some(2));
    }
}

#[tokio::test]
async fn test_suite_report_serializes() {
    let validator = Validator::builtin().unwrap();
    let batch = orders_batch();
    let suite = ExpectationSuite::new("orders")
        .expectation(between("amount", 0.0, 100.0).with_kwarg("mostly", json!(0.7)))
        .expectation(
            ExpectationConfiguration::new("expect_column_values_to_match_regex")
                .with_kwarg("column", json!("status"))
                .with_kwarg("regex", json!("^(shipped|pending)$")),
        )
        .expectation(
            ExpectationConfiguration::new("expect_column_values_to_match_regex")
                .with_kwarg("column", json!("no_such_column"))
                .with_kwarg("regex", json!("x")),
        );

    for engine in engines() {
        let report = validator
            .validate_suite(&suite, engine.as_ref(), &batch, &RuntimeConfiguration::new())
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.batch_id.as_str(), "orders");
        assert_eq!(report.statistics.evaluated_expectations, 3);
        assert_eq!(report.statistics.successful_expectations, 1);
        assert_eq!(report.statistics.unsuccessful_expectations, 2);
        assert!(report.results[2].raised_exception());

        let json = report.to_json_pretty().unwrap();
        let parsed: SuiteValidationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.suite_name, "orders");
        assert_eq!(parsed.results.len(), 3);
        assert_eq!(
            parsed.results[0].expectation_config.as_ref().unwrap().expectation_type(),
            "expect_column_values_to_be_between"
        );
    }
}

#[tokio::test]
async fn test_strict_validator_stops_on_first_error() {
    let validator = Validator::builtin()
        .unwrap()
        .with_config(ValidatorConfig::strict());
    let batch = orders_batch();
    let suite = ExpectationSuite::new("strict").expectation(
        ExpectationConfiguration::new("expect_column_values_to_match_regex")
            .with_kwarg("column", json!("status"))
            .with_kwarg("regex", json!("(unclosed")),
    );

    let err = validator
        .validate_suite(&suite, &InMemoryExecutionEngine::new(), &batch, &RuntimeConfiguration::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidConfigurationError");
}

#[tokio::test]
async fn test_suite_loaded_from_json() {
    let suite = ExpectationSuite::from_json(
        r#"{
            "expectation_suite_name": "codes",
            "expectations": [
                {
                    "expectation_type": "expect_column_value_lengths_to_be_between",
                    "kwargs": {"column": "code", "min_value": 1, "max_value": 4},
                    "meta": {"notes": "codes are short"}
                }
            ]
        }"#,
    )
    .unwrap();
    let batch = codes_batch(vec![Some("a"), Some("bb")]);

    let report = Validator::builtin()
        .unwrap()
        .validate_suite(&suite, &SqlExecutionEngine::new(), &batch, &RuntimeConfiguration::new())
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.results[0].meta.get("notes"), Some(&json!("codes are short")));
}
