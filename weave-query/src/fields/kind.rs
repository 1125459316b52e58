//! Scalar kinds: parsing, decoding and checking per value type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::params::parse_bool;
use crate::value::Value;

/// Behaviour specific to one scalar value type.
///
/// The associated constants select which filter suffixes the kind supports.
pub trait ScalarKind: fmt::Debug + Clone + Send + Sync + 'static {
    /// Kind name used in messages.
    const NAME: &'static str;
    /// Supports `__lt` / `__gt`.
    const ORDERED: bool = false;
    /// Supports `__before` / `__after`.
    const TEMPORAL: bool = false;
    /// Supports `__length*` and `__contains`.
    const TEXTUAL: bool = false;
    /// SQL type both sides are cast to when compared or sorted.
    ///
    /// Set for kinds a store may keep as text but must order numerically.
    const SQL_CAST: Option<&'static str> = None;

    /// Parse a query-parameter literal.
    fn parse_literal(&self, raw: &str) -> Result<Value, String>;

    /// Convert a JSON payload value (never null).
    fn from_json(&self, json: &JsonValue) -> Result<Value, String>;

    /// Convert a raw storage value (never null).
    fn decode(&self, raw: &Value) -> Result<Value, String>;

    /// Whether `value` has this kind's shape.
    fn accepts(&self, value: &Value) -> bool;

    /// Kind-specific rules such as length or range.
    fn check(&self, _value: &Value) -> Result<(), String> {
        Ok(())
    }
}

fn expected(kind: &str, got: impl fmt::Display) -> String {
    format!("expected {}, got {}", kind, got)
}

/// Boolean values.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolKind;

impl ScalarKind for BoolKind {
    const NAME: &'static str = "boolean";

    fn parse_literal(&self, raw: &str) -> Result<Value, String> {
        parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| format!("'{}' is not a valid boolean", raw))
    }

    fn from_json(&self, json: &JsonValue) -> Result<Value, String> {
        json.as_bool()
            .map(Value::Bool)
            .ok_or_else(|| expected(Self::NAME, json))
    }

    fn decode(&self, raw: &Value) -> Result<Value, String> {
        match raw {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Int(i) => Ok(Value::Bool(*i != 0)),
            Value::Text(s) => self.parse_literal(s),
            other => Err(expected(Self::NAME, other.kind_name())),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }
}

/// Text values with optional length bounds (in characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct TextKind {
    /// Minimum length.
    pub min_len: Option<usize>,
    /// Maximum length.
    pub max_len: Option<usize>,
}

impl ScalarKind for TextKind {
    const NAME: &'static str = "text";
    const TEXTUAL: bool = true;

    fn parse_literal(&self, raw: &str) -> Result<Value, String> {
        Ok(Value::Text(raw.to_string()))
    }

    fn from_json(&self, json: &JsonValue) -> Result<Value, String> {
        json.as_str()
            .map(|s| Value::Text(s.to_string()))
            .ok_or_else(|| expected(Self::NAME, json))
    }

    fn decode(&self, raw: &Value) -> Result<Value, String> {
        match raw {
            Value::Text(s) => Ok(Value::Text(s.clone())),
            Value::Int(_) | Value::Float(_) | Value::Decimal(_) => Ok(Value::Text(raw.to_string())),
            other => Err(expected(Self::NAME, other.kind_name())),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Text(_))
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        let Value::Text(s) = value else {
            return Err(expected(Self::NAME, value.kind_name()));
        };
        let len = s.chars().count();
        if let Some(min) = self.min_len {
            if len < min {
                return Err(format!("must be at least {} characters", min));
            }
        }
        if let Some(max) = self.max_len {
            if len > max {
                return Err(format!("must be at most {} characters", max));
            }
        }
        Ok(())
    }
}

/// 64-bit integers with an optional inclusive range.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerKind {
    /// Inclusive lower bound.
    pub min: Option<i64>,
    /// Inclusive upper bound.
    pub max: Option<i64>,
}

impl ScalarKind for IntegerKind {
    const NAME: &'static str = "integer";
    const ORDERED: bool = true;

    fn parse_literal(&self, raw: &str) -> Result<Value, String> {
        raw.trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("'{}' is not a valid integer", raw))
    }

    fn from_json(&self, json: &JsonValue) -> Result<Value, String> {
        json.as_i64()
            .map(Value::Int)
            .ok_or_else(|| expected(Self::NAME, json))
    }

    fn decode(&self, raw: &Value) -> Result<Value, String> {
        match raw {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
            Value::Text(s) => self.parse_literal(s),
            other => Err(expected(Self::NAME, other.kind_name())),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Int(_))
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        let Value::Int(n) = value else {
            return Err(expected(Self::NAME, value.kind_name()));
        };
        if let Some(min) = self.min {
            if *n < min {
                return Err(format!("must be at least {}", min));
            }
        }
        if let Some(max) = self.max {
            if *n > max {
                return Err(format!("must be at most {}", max));
            }
        }
        Ok(())
    }
}

/// Exact decimals with an optional inclusive range.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalKind {
    /// Inclusive lower bound.
    pub min: Option<Decimal>,
    /// Inclusive upper bound.
    pub max: Option<Decimal>,
}

impl ScalarKind for DecimalKind {
    const NAME: &'static str = "decimal";
    const ORDERED: bool = true;
    const SQL_CAST: Option<&'static str> = Some("NUMERIC");

    fn parse_literal(&self, raw: &str) -> Result<Value, String> {
        Decimal::from_str(raw.trim())
            .map(Value::Decimal)
            .map_err(|_| format!("'{}' is not a valid decimal", raw))
    }

    fn from_json(&self, json: &JsonValue) -> Result<Value, String> {
        match json {
            JsonValue::String(s) => self.parse_literal(s),
            JsonValue::Number(n) => self.parse_literal(&n.to_string()),
            other => Err(expected(Self::NAME, other)),
        }
    }

    fn decode(&self, raw: &Value) -> Result<Value, String> {
        match raw {
            Value::Decimal(d) => Ok(Value::Decimal(*d)),
            Value::Int(i) => Ok(Value::Decimal(Decimal::from(*i))),
            Value::Float(f) => self.parse_literal(&f.to_string()),
            Value::Text(s) => self.parse_literal(s),
            other => Err(expected(Self::NAME, other.kind_name())),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Decimal(_))
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        let Value::Decimal(d) = value else {
            return Err(expected(Self::NAME, value.kind_name()));
        };
        if let Some(min) = self.min {
            if *d < min {
                return Err(format!("must be at least {}", min));
            }
        }
        if let Some(max) = self.max {
            if *d > max {
                return Err(format!("must be at most {}", max));
            }
        }
        Ok(())
    }
}

/// Calendar dates, written `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateKind;

impl ScalarKind for DateKind {
    const NAME: &'static str = "date";
    const ORDERED: bool = true;
    const TEMPORAL: bool = true;

    fn parse_literal(&self, raw: &str) -> Result<Value, String> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| format!("'{}' is not a valid date (YYYY-MM-DD)", raw))
    }

    fn from_json(&self, json: &JsonValue) -> Result<Value, String> {
        json.as_str()
            .ok_or_else(|| expected(Self::NAME, json))
            .and_then(|s| self.parse_literal(s))
    }

    fn decode(&self, raw: &Value) -> Result<Value, String> {
        match raw {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::DateTime(dt) => Ok(Value::Date(dt.date_naive())),
            Value::Text(s) => self.parse_literal(s),
            other => Err(expected(Self::NAME, other.kind_name())),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Date(_))
    }
}

/// Timestamps, written as RFC 3339 and normalised to UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeKind;

impl DateTimeKind {
    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

impl ScalarKind for DateTimeKind {
    const NAME: &'static str = "datetime";
    const ORDERED: bool = true;
    const TEMPORAL: bool = true;

    fn parse_literal(&self, raw: &str) -> Result<Value, String> {
        Self::parse(raw)
            .map(Value::DateTime)
            .ok_or_else(|| format!("'{}' is not a valid RFC 3339 timestamp", raw))
    }

    fn from_json(&self, json: &JsonValue) -> Result<Value, String> {
        json.as_str()
            .ok_or_else(|| expected(Self::NAME, json))
            .and_then(|s| self.parse_literal(s))
    }

    fn decode(&self, raw: &Value) -> Result<Value, String> {
        match raw {
            Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
            Value::Text(s) => self.parse_literal(s),
            other => Err(expected(Self::NAME, other.kind_name())),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::DateTime(_))
    }
}
