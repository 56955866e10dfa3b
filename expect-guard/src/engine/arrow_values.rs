//! Arrow cell access as JSON values.

use crate::core::{float_to_json, Row};
use crate::error::{ExpectError, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, LargeStringArray, StringArray, StringViewArray, UInt16Array, UInt32Array,
    UInt64Array, UInt8Array,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use serde_json::Value;

macro_rules! downcast_value {
    ($array:expr, $ty:ty, $row:expr, $conv:expr) => {
        match $array.as_any().downcast_ref::<$ty>() {
            Some(typed) => $conv(typed.value($row)),
            None => Value::Null,
        }
    };
}

/// The value of one cell as JSON. Null cells become [`Value::Null`]; types
/// without a natural JSON form fall back to Arrow's display string.
pub fn value_at(array: &dyn Array, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match array.data_type() {
        DataType::Boolean => downcast_value!(array, BooleanArray, row, Value::Bool),
        DataType::Int8 => downcast_value!(array, Int8Array, row, Value::from),
        DataType::Int16 => downcast_value!(array, Int16Array, row, Value::from),
        DataType::Int32 => downcast_value!(array, Int32Array, row, Value::from),
        DataType::Int64 => downcast_value!(array, Int64Array, row, Value::from),
        DataType::UInt8 => downcast_value!(array, UInt8Array, row, Value::from),
        DataType::UInt16 => downcast_value!(array, UInt16Array, row, Value::from),
        DataType::UInt32 => downcast_value!(array, UInt32Array, row, Value::from),
        DataType::UInt64 => downcast_value!(array, UInt64Array, row, Value::from),
        DataType::Float32 => {
            downcast_value!(array, Float32Array, row, |v: f32| float_to_json(f64::from(v)))
        }
        DataType::Float64 => downcast_value!(array, Float64Array, row, float_to_json),
        DataType::Utf8 => downcast_value!(array, StringArray, row, |v: &str| Value::String(
            v.to_string()
        )),
        DataType::LargeUtf8 => downcast_value!(array, LargeStringArray, row, |v: &str| {
            Value::String(v.to_string())
        }),
        DataType::Utf8View => downcast_value!(array, StringViewArray, row, |v: &str| {
            Value::String(v.to_string())
        }),
        _ => array_value_to_string(array, row)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// The value of one cell rendered as text, as a length metric sees it.
pub fn string_at(array: &dyn Array, row: usize) -> Option<String> {
    if array.is_null(row) {
        return None;
    }
    match array.data_type() {
        DataType::Utf8 => Some(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Some(array.as_string::<i64>().value(row).to_string()),
        DataType::Utf8View => Some(array.as_string_view().value(row).to_string()),
        _ => array_value_to_string(array, row).ok(),
    }
}

/// The value of one numeric cell. Non-numeric columns are a type mismatch.
pub fn numeric_at(array: &dyn Array, row: usize) -> Result<Option<f64>> {
    if !array.data_type().is_numeric() {
        return Err(ExpectError::type_mismatch(
            "numeric column",
            array.data_type().to_string(),
        ));
    }
    Ok(match value_at(array, row) {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    })
}

/// One full row as a JSON object keyed by column name.
pub fn row_to_json(records: &RecordBatch, row: usize) -> Row {
    records
        .schema()
        .fields()
        .iter()
        .zip(records.columns())
        .map(|(field, column)| (field.name().clone(), value_at(column.as_ref(), row)))
        .collect()
}
