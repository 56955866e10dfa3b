//! Batch constructors shared by unit tests.

use crate::core::Batch;
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};
use std::sync::Arc;

/// `people`: `name` (nullable) and `age`.
///
/// | name  | age |
/// |-------|-----|
/// | alice | 25  |
/// | bob   | 30  |
/// | null  | 22  |
/// | dave  | 41  |
pub fn names_and_ages() -> Batch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("age", DataType::Int64, false),
    ]));
    let records = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![
                Some("alice"),
                Some("bob"),
                None,
                Some("dave"),
            ])),
            Arc::new(Int64Array::from(vec![25, 30, 22, 41])),
        ],
    )
    .unwrap();
    Batch::from_records("people", records)
}

/// `strings`: a single nullable text column `value`.
pub fn string_batch(values: &[Option<&str>]) -> Batch {
    let schema = Arc::new(Schema::new(vec![Field::new("value", DataType::Utf8, true)]));
    let records = RecordBatch::try_new(
        schema,
        vec![Arc::new(StringArray::from(values.to_vec()))],
    )
    .unwrap();
    Batch::from_records("strings", records)
}

/// `floats`: a single nullable float column `value`.
pub fn float_batch(values: &[Option<f64>]) -> Batch {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "value",
        DataType::Float64,
        true,
    )]));
    let records = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(values.to_vec()))],
    )
    .unwrap();
    Batch::from_records("floats", records)
}

/// A JSON object literal as a kwargs map.
pub fn kwargs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("kwargs must be a JSON object, got {other}"),
    }
}
