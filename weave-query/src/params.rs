//! Request query parameters and the reader filters consume them through.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{QueryError, QueryResult};

/// Parameters outside the filter namespace.
const RESERVED: &[&str] = &["include", "sort"];
const RESERVED_PREFIXES: &[&str] = &["page[", "fields["];

/// Multi-valued query parameters in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: IndexMap<String, Vec<String>>,
}

impl QueryParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URL query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    /// Append a value.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// All values for a key.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// First value for a key.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Iterate over keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

/// Reads parameters while tracking which keys were consumed.
///
/// Every field compiler reads its own keys; [`finish`](Self::finish) then
/// rejects whatever no field recognised.
#[derive(Debug)]
pub struct ParamReader<'a> {
    params: &'a QueryParams,
    consumed: HashSet<&'a str>,
}

impl<'a> ParamReader<'a> {
    /// Create a reader over a parameter set.
    pub fn new(params: &'a QueryParams) -> Self {
        Self {
            params,
            consumed: HashSet::new(),
        }
    }

    fn take(&mut self, key: &str) -> Option<(&'a str, &'a [String])> {
        let params: &'a QueryParams = self.params;
        let (stored, values) = params.entries.get_key_value(key)?;
        self.consumed.insert(stored.as_str());
        Some((stored.as_str(), values.as_slice()))
    }

    /// Read a single-valued parameter; more than one value is an arity error.
    pub fn single(&mut self, key: &str) -> QueryResult<Option<&'a str>> {
        match self.take(key) {
            None => Ok(None),
            Some((_, [value])) => Ok(Some(value.as_str())),
            Some((_, [])) => Ok(None),
            Some((stored, values)) => Err(QueryError::invalid_filter(
                stored,
                format!("expected one value, got {}", values.len()),
            )),
        }
    }

    /// Read a multi-valued parameter, splitting each value on commas.
    pub fn multi(&mut self, key: &str) -> Option<Vec<&'a str>> {
        let (_, values) = self.take(key)?;
        Some(
            values
                .iter()
                .flat_map(|v| v.split(','))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect(),
        )
    }

    /// Read a single-valued boolean flag.
    pub fn flag(&mut self, key: &str) -> QueryResult<Option<bool>> {
        self.single(key)?
            .map(|raw| {
                parse_bool(raw).ok_or_else(|| {
                    QueryError::invalid_filter(key, format!("'{}' is not a valid boolean", raw))
                })
            })
            .transpose()
    }

    /// Read a single-valued non-negative integer.
    pub fn count(&mut self, key: &str) -> QueryResult<Option<i64>> {
        self.single(key)?
            .map(|raw| match raw.parse::<i64>() {
                Ok(n) if n >= 0 => Ok(n),
                _ => Err(QueryError::invalid_filter(
                    key,
                    format!("'{}' is not a non-negative integer", raw),
                )),
            })
            .transpose()
    }

    /// Fail on any non-reserved key that no field consumed.
    pub fn finish(self, model: &str) -> QueryResult<()> {
        for key in self.params.keys() {
            if self.consumed.contains(key) || is_reserved(key) {
                continue;
            }
            return Err(QueryError::unknown_field(model, key)
                .with_suggestion("Check the field name and filter suffix"));
        }
        Ok(())
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED.contains(&key) || RESERVED_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Parse a boolean literal.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
