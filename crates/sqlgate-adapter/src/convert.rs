//! JSON-safe coercion of result-set cells.
//!
//! Driver results arrive as Arrow arrays; the wire wants plain JSON. The
//! rules: character data stays text, byte data becomes base64, temporal
//! values become ISO-8601 strings (UTC assumed when the driver reports no
//! zone), lists recurse, and anything exotic falls back to Arrow's display
//! form. A cell that cannot be coerced becomes `null` rather than failing
//! the whole row.

use arrow::util::display::{ArrayFormatter, FormatOptions};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow_array::Array;
use arrow_schema::{DataType, TimeUnit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveTime, SecondsFormat};
use serde_json::{Number, Value, json};

/// Coerce one cell to a JSON value. Never fails; unsupported or broken cells
/// come back as `Value::Null`.
pub fn cell_to_json(array: &dyn Array, row: usize) -> Value {
    if row >= array.len() || array.is_null(row) {
        return Value::Null;
    }
    try_cell_to_json(array, row).unwrap_or(Value::Null)
}

fn try_cell_to_json(array: &dyn Array, row: usize) -> Option<Value> {
    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => json!(array.as_boolean().value(row)),

        DataType::Int8 => json!(array.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => json!(array.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => json!(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => json!(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => json!(array.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => json!(array.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => json!(array.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => json!(array.as_primitive::<UInt64Type>().value(row)),

        DataType::Float32 => float_to_json(array.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => float_to_json(array.as_primitive::<Float64Type>().value(row)),

        DataType::Decimal128(_, scale) => {
            decimal_to_json(array.as_primitive::<Decimal128Type>().value(row), *scale)
        }

        DataType::Utf8 => json!(array.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => json!(array.as_string::<i64>().value(row)),

        DataType::Binary => json!(BASE64.encode(array.as_binary::<i32>().value(row))),
        DataType::LargeBinary => json!(BASE64.encode(array.as_binary::<i64>().value(row))),

        DataType::Timestamp(unit, _tz) => {
            // Values are stored relative to the UNIX epoch; a missing zone is
            // treated as UTC.
            let dt = match unit {
                TimeUnit::Second => DateTime::from_timestamp(
                    array.as_primitive::<TimestampSecondType>().value(row),
                    0,
                ),
                TimeUnit::Millisecond => DateTime::from_timestamp_millis(
                    array.as_primitive::<TimestampMillisecondType>().value(row),
                ),
                TimeUnit::Microsecond => DateTime::from_timestamp_micros(
                    array.as_primitive::<TimestampMicrosecondType>().value(row),
                ),
                TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(
                    array.as_primitive::<TimestampNanosecondType>().value(row),
                )),
            }?;
            json!(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }

        DataType::Date32 => {
            let days = array.as_primitive::<Date32Type>().value(row) as i64;
            let dt = DateTime::from_timestamp(days * 86_400, 0)?;
            json!(dt.date_naive().to_string())
        }
        DataType::Date64 => {
            let millis = array.as_primitive::<Date64Type>().value(row);
            let dt = DateTime::from_timestamp_millis(millis)?;
            json!(dt.date_naive().to_string())
        }

        DataType::Time32(TimeUnit::Second) => {
            let secs = array.as_primitive::<Time32SecondType>().value(row);
            json!(NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?.to_string())
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            let millis = array.as_primitive::<Time32MillisecondType>().value(row);
            let (secs, sub) = (millis / 1000, (millis % 1000) * 1_000_000);
            json!(NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, sub as u32)?.to_string())
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let micros = array.as_primitive::<Time64MicrosecondType>().value(row);
            let (secs, sub) = (micros / 1_000_000, (micros % 1_000_000) * 1000);
            json!(NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, sub as u32)?.to_string())
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            let nanos = array.as_primitive::<Time64NanosecondType>().value(row);
            let (secs, sub) = (nanos / 1_000_000_000, nanos % 1_000_000_000);
            json!(NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, sub as u32)?.to_string())
        }

        DataType::List(_) => {
            let values = array.as_list::<i32>().value(row);
            list_to_json(values.as_ref())
        }
        DataType::LargeList(_) => {
            let values = array.as_list::<i64>().value(row);
            list_to_json(values.as_ref())
        }

        // Structs, maps, unions, intervals, durations: keep the structure
        // identity by rendering the driver's display form as a string.
        _ => display_fallback(array, row)?,
    };
    Some(value)
}

fn list_to_json(values: &dyn Array) -> Value {
    Value::Array((0..values.len()).map(|i| cell_to_json(values, i)).collect())
}

fn float_to_json(value: f64) -> Value {
    // NaN and infinities have no JSON representation.
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn decimal_to_json(raw: i128, scale: i8) -> Value {
    if scale <= 0 {
        // Integral decimal; keep it numeric when it fits.
        let widened = 10_i128
            .checked_pow(scale.unsigned_abs() as u32)
            .and_then(|multiplier| raw.checked_mul(multiplier));
        return match widened.and_then(|v| i64::try_from(v).ok()) {
            Some(v) => json!(v),
            None => json!(format_decimal(raw, scale)),
        };
    }
    json!(format_decimal(raw, scale))
}

/// Render a raw decimal mantissa with the given scale, e.g. (12345, 2) → "123.45".
pub fn format_decimal(raw: i128, scale: i8) -> String {
    if scale <= 0 {
        let zeros = "0".repeat(scale.unsigned_abs() as usize);
        return format!("{raw}{zeros}");
    }
    let negative = raw < 0;
    let digits = raw.unsigned_abs().to_string();
    let scale = scale as usize;
    let (int_part, frac_part) = if digits.len() > scale {
        let split = digits.len() - scale;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = scale))
    };
    let sign = if negative { "-" } else { "" };
    format!("{sign}{int_part}.{frac_part}")
}

fn display_fallback(array: &dyn Array, row: usize) -> Option<Value> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array, &options).ok()?;
    Some(json!(formatter.value(row).try_to_string().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::builder::{ListBuilder, StringBuilder};
    use arrow_array::{
        BinaryArray, BooleanArray, Decimal128Array, Float64Array, Int64Array, LargeStringArray,
        StringArray, StructArray, TimestampMicrosecondArray,
    };
    use arrow_schema::Field;
    use std::sync::Arc;

    #[test]
    fn test_strings_and_large_strings() {
        let arr = StringArray::from(vec![Some("plain"), None]);
        assert_eq!(cell_to_json(&arr, 0), json!("plain"));
        assert_eq!(cell_to_json(&arr, 1), Value::Null);

        let clob = LargeStringArray::from(vec!["a very large clob"]);
        assert_eq!(cell_to_json(&clob, 0), json!("a very large clob"));
    }

    #[test]
    fn test_binary_becomes_base64() {
        let arr = BinaryArray::from(vec![&b"\x00\x01\xff"[..]]);
        assert_eq!(cell_to_json(&arr, 0), json!(BASE64.encode(b"\x00\x01\xff")));
    }

    #[test]
    fn test_numbers_keep_integral_identity() {
        let ints = Int64Array::from(vec![42]);
        assert_eq!(cell_to_json(&ints, 0), json!(42));

        let floats = Float64Array::from(vec![1.5, f64::NAN]);
        assert_eq!(cell_to_json(&floats, 0), json!(1.5));
        assert_eq!(cell_to_json(&floats, 1), Value::Null);
    }

    #[test]
    fn test_decimal_scale_handling() {
        let arr = Decimal128Array::from(vec![12345_i128])
            .with_precision_and_scale(10, 2)
            .unwrap();
        assert_eq!(cell_to_json(&arr, 0), json!("123.45"));

        let arr = Decimal128Array::from(vec![987_i128])
            .with_precision_and_scale(10, 0)
            .unwrap();
        assert_eq!(cell_to_json(&arr, 0), json!(987));
    }

    #[test]
    fn test_format_decimal_edge_cases() {
        assert_eq!(format_decimal(-12345, 2), "-123.45");
        assert_eq!(format_decimal(5, 3), "0.005");
        assert_eq!(format_decimal(7, -2), "700");
    }

    #[test]
    fn test_timestamp_renders_utc_iso() {
        // 2021-01-01T00:00:00Z
        let arr = TimestampMicrosecondArray::from(vec![1_609_459_200_000_000_i64]);
        assert_eq!(cell_to_json(&arr, 0), json!("2021-01-01T00:00:00Z"));
    }

    #[test]
    fn test_list_recurses() {
        let mut builder = ListBuilder::new(StringBuilder::new());
        builder.values().append_value("x");
        builder.values().append_value("y");
        builder.append(true);
        let arr = builder.finish();
        assert_eq!(cell_to_json(&arr, 0), json!(["x", "y"]));
    }

    #[test]
    fn test_struct_falls_back_to_string() {
        let inner: arrow_array::ArrayRef = Arc::new(Int64Array::from(vec![7]));
        let arr = StructArray::from(vec![(
            Arc::new(Field::new("n", DataType::Int64, false)),
            inner,
        )]);
        let value = cell_to_json(&arr, 0);
        assert!(value.is_string(), "expected string fallback, got {value:?}");
    }
}
