//! Ordering types.

use std::fmt;

/// Sort order for ordering results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// One ordering term, naming a field key (not a column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// Attribute key, or `id`.
    pub field: String,
    /// The sort order.
    pub order: SortOrder,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Ascending on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    /// Descending on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Desc)
    }
}

/// An ordered list of ordering terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    fields: Vec<OrderByField>,
}

impl OrderBy {
    /// Create an empty order by (no ordering).
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse a `sort` parameter such as `-published,title`.
    ///
    /// A leading `-` means descending. Empty terms are skipped.
    pub fn parse(raw: &str) -> Self {
        let fields = raw
            .split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| match term.strip_prefix('-') {
                Some(key) => OrderByField::desc(key),
                None => OrderByField::asc(term),
            })
            .collect();
        Self { fields }
    }

    /// Check if the order by is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Add a field to the order by.
    pub fn then(mut self, field: OrderByField) -> Self {
        self.fields.push(field);
        self
    }

    /// Iterate over the terms.
    pub fn iter(&self) -> impl Iterator<Item = &OrderByField> {
        self.fields.iter()
    }
}

impl From<OrderByField> for OrderBy {
    fn from(field: OrderByField) -> Self {
        Self {
            fields: vec![field],
        }
    }
}
