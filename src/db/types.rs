//! Row to [`Record`] conversion.
//!
//! Each column's driver type name is classified into a [`TypeCategory`]; the
//! category picks the Rust types tried when decoding the value. Byte strings
//! become text, and bytes that are not valid UTF-8 become base64 so nothing
//! is silently dropped.

use crate::models::Record;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::{Column, Decode, MySql, Row, Type, TypeInfo};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Text,
    Binary,
    Json,
}

/// Classify a MySQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();
    let base = lower.split_whitespace().next().unwrap_or_default();

    match base {
        "decimal" | "numeric" => TypeCategory::Decimal,
        // TINYINT(1) is reported as BOOLEAN
        "bool" | "boolean" => TypeCategory::Boolean,
        "year" => TypeCategory::Integer,
        "float" | "double" | "real" => TypeCategory::Float,
        "json" => TypeCategory::Json,
        "date" | "time" | "datetime" | "timestamp" => TypeCategory::Temporal,
        "bit" | "geometry" => TypeCategory::Binary,
        _ if base.ends_with("int") => TypeCategory::Integer,
        _ if base.ends_with("blob") || base.ends_with("binary") => TypeCategory::Binary,
        // char, varchar, text, enum, set
        _ => TypeCategory::Text,
    }
}

/// DECIMAL kept as the server's exact text.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        categorize_type(ty.name()) == TypeCategory::Decimal
    }
}

impl<'r> Decode<'r, MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let text = <&str as Decode<MySql>>::decode(value)?;
        Ok(RawDecimal(text.to_owned()))
    }
}

/// Decode a byte string to text, falling back to base64 for invalid UTF-8.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => STANDARD.encode(bytes),
    };
    JsonValue::String(text)
}

/// Convert one result row to a [`Record`].
pub fn row_to_record(row: &MySqlRow) -> Record {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let category = categorize_type(column.type_info().name());
        record.insert(column.name().to_owned(), decode_column(row, idx, category));
    }
    record
}

/// Decode a non-null value as `T`; `None` for NULL or a type mismatch.
fn try_decode<'r, T>(row: &'r MySqlRow, idx: usize) -> Option<T>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
    let value = match category {
        TypeCategory::Integer => try_decode::<i64>(row, idx)
            .map(JsonValue::from)
            .or_else(|| try_decode::<u64>(row, idx).map(JsonValue::from)),
        TypeCategory::Float => try_decode::<f64>(row, idx)
            .or_else(|| try_decode::<f32>(row, idx).map(f64::from))
            .map(float_value),
        TypeCategory::Decimal => try_decode::<RawDecimal>(row, idx).map(|d| JsonValue::String(d.0)),
        TypeCategory::Boolean => try_decode::<bool>(row, idx).map(JsonValue::Bool),
        TypeCategory::Temporal => temporal_text(row, idx)
            .map(JsonValue::String)
            // Zero dates and negative TIME values do not fit chrono
            .or_else(|| text_value(row, idx)),
        TypeCategory::Binary => try_decode::<Vec<u8>>(row, idx).map(|b| decode_binary_value(&b)),
        TypeCategory::Json => try_decode::<JsonValue>(row, idx),
        TypeCategory::Text => text_value(row, idx),
    };
    value.unwrap_or(JsonValue::Null)
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn temporal_text(row: &MySqlRow, idx: usize) -> Option<String> {
    if let Some(v) = try_decode::<NaiveDateTime>(row, idx) {
        return Some(v.format(DATETIME_FORMAT).to_string());
    }
    if let Some(v) = try_decode::<DateTime<Utc>>(row, idx) {
        return Some(v.format(DATETIME_FORMAT).to_string());
    }
    if let Some(v) = try_decode::<NaiveDate>(row, idx) {
        return Some(v.format("%Y-%m-%d").to_string());
    }
    try_decode::<NaiveTime>(row, idx).map(|v| v.format("%H:%M:%S%.f").to_string())
}

fn text_value(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
    try_decode::<String>(row, idx).map(JsonValue::String).or_else(|| {
        // Text delivered as a byte string
        row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|b| decode_binary_value(&b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        for name in ["INT", "BIGINT UNSIGNED", "TINYINT", "SMALLINT", "MEDIUMINT", "YEAR"] {
            assert_eq!(categorize_type(name), TypeCategory::Integer, "{}", name);
        }
    }

    #[test]
    fn test_boolean_is_not_integer() {
        assert_eq!(categorize_type("BOOLEAN"), TypeCategory::Boolean);
    }

    #[test]
    fn test_numeric_types() {
        assert_eq!(categorize_type("DECIMAL"), TypeCategory::Decimal);
        assert_eq!(categorize_type("NUMERIC"), TypeCategory::Decimal);
        assert_eq!(categorize_type("FLOAT"), TypeCategory::Float);
        assert_eq!(categorize_type("DOUBLE"), TypeCategory::Float);
    }

    #[test]
    fn test_temporal_types() {
        for name in ["DATETIME", "TIMESTAMP", "DATE", "TIME"] {
            assert_eq!(categorize_type(name), TypeCategory::Temporal, "{}", name);
        }
    }

    #[test]
    fn test_binary_text_and_json_types() {
        assert_eq!(categorize_type("BLOB"), TypeCategory::Binary);
        assert_eq!(categorize_type("MEDIUMBLOB"), TypeCategory::Binary);
        assert_eq!(categorize_type("VARBINARY"), TypeCategory::Binary);
        assert_eq!(categorize_type("BIT"), TypeCategory::Binary);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Text);
        assert_eq!(categorize_type("TEXT"), TypeCategory::Text);
        assert_eq!(categorize_type("ENUM"), TypeCategory::Text);
        assert_eq!(categorize_type("JSON"), TypeCategory::Json);
    }

    #[test]
    fn test_float_value_non_finite() {
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
        assert_eq!(float_value(f64::NAN), JsonValue::String("NaN".to_string()));
    }

    #[test]
    fn test_binary_utf8_becomes_text() {
        assert_eq!(
            decode_binary_value(b"hello world"),
            JsonValue::String("hello world".to_string())
        );
        assert_eq!(decode_binary_value(&[]), JsonValue::String(String::new()));
    }

    #[test]
    fn test_binary_non_utf8_becomes_base64() {
        let bytes: &[u8] = &[0xFF, 0xFE, 0x00, 0x01];
        assert_eq!(decode_binary_value(bytes), JsonValue::String("//4AAQ==".to_string()));
    }
}
