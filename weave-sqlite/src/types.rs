//! Type conversion utilities for SQLite.

use chrono::SecondsFormat;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use weave_query::Value;

/// Convert an engine value to a SQLite value.
///
/// Decimals and temporal values are stored as text; booleans as 0/1.
pub fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::Decimal(d) => SqliteValue::Text(d.to_string()),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Date(d) => SqliteValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => SqliteValue::Text(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

/// Convert a SQLite column value to an engine value.
///
/// Storage classes map one to one; field descriptors refine them on decode.
pub fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Rewrite `$n` placeholders to SQLite's numbered `?n` form.
///
/// SQLite reads `$1` as a named parameter indexed by first appearance, so
/// composed statements that reuse or reorder placeholders would bind the
/// wrong values. String literals and quoted identifiers are left alone.
pub fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '$' if chars.peek().is_some_and(|n| n.is_ascii_digit()) => out.push('?'),
                _ => out.push(c),
            },
        }
    }
    out
}
