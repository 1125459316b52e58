//! Scalar values exchanged with the persistence layer, and tri-state input.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

/// A scalar value bound as a query argument or read from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Exact decimal.
    Decimal(Decimal),
    /// Text.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Timestamp in UTC.
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text content, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
        }
    }

    /// Render an identifier column value as an opaque id string.
    ///
    /// Returns `None` for null.
    pub fn id_string(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Order two values of compatible kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Convert to the JSON representation used in documents.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Decimal(d) => JsonValue::String(d.to_string()),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "{}", s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A value supplied by a caller for a write.
///
/// Updates must tell "field omitted" apart from "field explicitly cleared".
#[derive(Debug, Clone, PartialEq)]
pub enum Input<T> {
    /// Not supplied; leave unchanged or use the default.
    Unset,
    /// Explicit null.
    Null,
    /// Present with a value.
    Value(T),
}

impl<T> Default for Input<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Input<T> {
    /// Check if the input was omitted.
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Check if the input was supplied (null or value).
    pub fn is_set(&self) -> bool {
        !self.is_unset()
    }

    /// Borrow the inner value.
    pub fn as_ref(&self) -> Input<&T> {
        match self {
            Self::Unset => Input::Unset,
            Self::Null => Input::Null,
            Self::Value(v) => Input::Value(v),
        }
    }

    /// Map the inner value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Input<U> {
        match self {
            Self::Unset => Input::Unset,
            Self::Null => Input::Null,
            Self::Value(v) => Input::Value(f(v)),
        }
    }
}

impl<'a> Input<&'a JsonValue> {
    /// Classify an optional JSON member.
    pub fn from_json(member: Option<&'a JsonValue>) -> Self {
        match member {
            None => Self::Unset,
            Some(JsonValue::Null) => Self::Null,
            Some(v) => Self::Value(v),
        }
    }
}

impl Input<Value> {
    /// Collapse into the value to store, treating null as [`Value::Null`].
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Unset => None,
            Self::Null => Some(Value::Null),
            Self::Value(v) => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_string() {
        assert_eq!(Value::from("abc").id_string().as_deref(), Some("abc"));
        assert_eq!(Value::Int(42).id_string().as_deref(), Some("42"));
        assert_eq!(Value::Null.id_string(), None);
    }

    #[test]
    fn test_to_json() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::Date(date).to_json(), json!("2024-02-29"));
        assert_eq!(Value::Decimal(Decimal::new(1250, 2)).to_json(), json!("12.50"));
        assert_eq!(Value::Null.to_json(), JsonValue::Null);
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("b").compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_input_from_json() {
        let body = json!({"title": "Dune", "subtitle": null});
        assert_eq!(Input::from_json(body.get("title")), Input::Value(&json!("Dune")));
        assert_eq!(Input::from_json(body.get("subtitle")), Input::Null);
        assert!(Input::from_json(body.get("pages")).is_unset());
    }
}
