//! Conversion between SQLite values and JSON

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Converts a column value to JSON.
///
/// Text is returned as a string even when it holds JSON, so cells keep the
/// exact stored text; blobs become byte arrays.
pub fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().copied().map(Value::from).collect()),
    }
}

/// Converts a bound parameter to the SQLite value it stands for.
///
/// Strings bind as TEXT without JSON quoting and booleans as 0/1. Arrays and
/// objects bind as their JSON text.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => number.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// The text a `REGEXP` match runs against; `None` for NULL.
pub fn to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(text) | ValueRef::Blob(text) => {
            Some(String::from_utf8_lossy(text).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_storage_classes() {
        assert_eq!(to_json(ValueRef::Null), Value::Null);
        assert_eq!(to_json(ValueRef::Integer(7)), json!(7));
        assert_eq!(to_json(ValueRef::Real(1.5)), json!(1.5));
        assert_eq!(to_json(ValueRef::Text(b"<b>x</b>")), json!("<b>x</b>"));
        assert_eq!(to_json(ValueRef::Blob(&[1, 2])), json!([1, 2]));
    }

    #[test]
    fn binds_parameters_as_native_values() {
        assert_eq!(to_sql(&Value::Null), SqlValue::Null);
        assert_eq!(to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql(&json!(false)), SqlValue::Integer(0));
        assert_eq!(to_sql(&json!(-3)), SqlValue::Integer(-3));
        assert_eq!(to_sql(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(to_sql(&json!(u64::MAX)), SqlValue::Real(u64::MAX as f64));
        assert_eq!(to_sql(&json!("%First%")), SqlValue::Text("%First%".into()));
        assert_eq!(
            to_sql(&json!({ "color": "red" })),
            SqlValue::Text(r#"{"color":"red"}"#.into())
        );
        assert_eq!(to_sql(&json!([1, 2])), SqlValue::Text("[1,2]".into()));
    }

    #[test]
    fn regexp_subjects() {
        assert_eq!(to_text(ValueRef::Null), None);
        assert_eq!(to_text(ValueRef::Integer(42)).as_deref(), Some("42"));
        assert_eq!(to_text(ValueRef::Text(b"abc")).as_deref(), Some("abc"));
    }
}
