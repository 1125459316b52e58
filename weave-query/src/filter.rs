//! Typed filters compiled from query parameters.
//!
//! Each [`Filter`] renders one WHERE fragment with positional `$n`
//! placeholders, pushing its arguments onto a shared list so fragments from
//! many fields can be joined into one statement.
//!
//! ```rust
//! use weave_query::filter::{CompareOp, Filter, qualified};
//! use weave_query::Value;
//!
//! let filter = Filter::And(vec![
//!     Filter::Compare {
//!         column: qualified("books", "pages"),
//!         op: CompareOp::Gt,
//!         value: Value::Int(100),
//!     },
//!     Filter::IsNull { column: qualified("books", "subtitle"), is_null: true },
//! ]);
//!
//! let (sql, params) = filter.to_sql(0);
//! assert_eq!(sql, r#"("books"."pages" > $1 AND "books"."subtitle" IS NULL)"#);
//! assert_eq!(params, vec![Value::Int(100)]);
//! ```

use crate::value::Value;

/// Quote an identifier for use in SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a `table.column` reference.
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
}

impl CompareOp {
    /// The SQL operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

/// One condition inside a [`Subquery`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubCondition {
    /// `column = value`
    Equals(String, Value),
    /// `column IN (values)`
    InList(String, Vec<Value>),
    /// `column = outer_column`, correlating with the enclosing query.
    Correlated(String, String),
    /// `column IS NOT NULL`
    NotNull(String),
}

/// A single-column subquery used by membership and count filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    /// Selected expression (already quoted).
    pub select: String,
    /// FROM clause (already quoted).
    pub from: String,
    /// Conditions joined with AND.
    pub conditions: Vec<SubCondition>,
}

impl Subquery {
    /// Create a subquery selecting `select` from `from`.
    pub fn new(select: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            from: from.into(),
            conditions: Vec::new(),
        }
    }

    /// Add a condition.
    pub fn condition(mut self, condition: SubCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    fn where_sql(&self, offset: usize, params: &mut Vec<Value>) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|c| match c {
                SubCondition::Equals(col, val) => {
                    format!("{} = {}", col, push_param(offset, params, val.clone()))
                }
                SubCondition::InList(col, values) => {
                    if values.is_empty() {
                        return "FALSE".to_string();
                    }
                    let placeholders: Vec<String> = values
                        .iter()
                        .map(|v| push_param(offset, params, v.clone()))
                        .collect();
                    format!("{} IN ({})", col, placeholders.join(", "))
                }
                SubCondition::Correlated(col, outer) => format!("{} = {}", col, outer),
                SubCondition::NotNull(col) => format!("{} IS NOT NULL", col),
            })
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    fn select_sql(&self, offset: usize, params: &mut Vec<Value>) -> String {
        format!(
            "SELECT {} FROM {}{}",
            self.select,
            self.from,
            self.where_sql(offset, params)
        )
    }

    fn count_sql(&self, offset: usize, params: &mut Vec<Value>) -> String {
        format!(
            "SELECT COUNT(*) FROM {}{}",
            self.from,
            self.where_sql(offset, params)
        )
    }
}

/// A compiled filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column op value`
    Compare {
        /// Qualified column.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        value: Value,
    },
    /// `CAST(column AS t) op CAST(value AS t)`
    CastCompare {
        /// Qualified column.
        column: String,
        /// SQL type both sides are cast to.
        sql_type: &'static str,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        value: Value,
    },
    /// `column IN (values)`
    In {
        /// Qualified column.
        column: String,
        /// Candidate values.
        values: Vec<Value>,
    },
    /// `column IS [NOT] NULL`
    IsNull {
        /// Qualified column.
        column: String,
        /// `true` for IS NULL.
        is_null: bool,
    },
    /// `LENGTH(column) op value`
    Length {
        /// Qualified column.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Length in characters.
        value: i64,
    },
    /// Substring match.
    Contains {
        /// Qualified column.
        column: String,
        /// Literal substring; LIKE wildcards are escaped.
        needle: String,
    },
    /// `column [NOT] IN (subquery)`
    Member {
        /// Qualified column.
        column: String,
        /// Candidate set.
        subquery: Subquery,
        /// Render NOT IN.
        negate: bool,
    },
    /// `(SELECT COUNT(*) ...) op value`
    Count {
        /// Counted rows.
        subquery: Subquery,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        value: i64,
    },
    /// Conjunction.
    And(Vec<Filter>),
}

impl Filter {
    /// Generate SQL for this filter with parameter placeholders starting
    /// after `param_offset`.
    pub fn to_sql(&self, param_offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.to_sql_with_params(param_offset, &mut params);
        (sql, params)
    }

    /// Render into an argument list shared with the rest of a statement.
    pub fn render(&self, args: &mut Vec<Value>) -> String {
        self.to_sql_with_params(0, args)
    }

    fn to_sql_with_params(&self, offset: usize, params: &mut Vec<Value>) -> String {
        match self {
            Self::Compare { column, op, value } => {
                if value.is_null() && *op == CompareOp::Eq {
                    format!("{} IS NULL", column)
                } else {
                    let p = push_param(offset, params, value.clone());
                    format!("{} {} {}", column, op.as_sql(), p)
                }
            }
            Self::CastCompare {
                column,
                sql_type,
                op,
                value,
            } => {
                let p = push_param(offset, params, value.clone());
                format!(
                    "{} {} {}",
                    cast(column, sql_type),
                    op.as_sql(),
                    cast(&p, sql_type)
                )
            }
            Self::In { column, values } => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| push_param(offset, params, v.clone()))
                    .collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            Self::IsNull { column, is_null } => {
                if *is_null {
                    format!("{} IS NULL", column)
                } else {
                    format!("{} IS NOT NULL", column)
                }
            }
            Self::Length { column, op, value } => {
                let p = push_param(offset, params, Value::Int(*value));
                format!("LENGTH({}) {} {}", column, op.as_sql(), p)
            }
            Self::Contains { column, needle } => {
                let pattern = format!("%{}%", escape_like(needle));
                let p = push_param(offset, params, Value::Text(pattern));
                format!("{} LIKE {} ESCAPE '\\'", column, p)
            }
            Self::Member {
                column,
                subquery,
                negate,
            } => {
                let keyword = if *negate { "NOT IN" } else { "IN" };
                let inner = subquery.select_sql(offset, params);
                format!("{} {} ({})", column, keyword, inner)
            }
            Self::Count {
                subquery,
                op,
                value,
            } => {
                let inner = subquery.count_sql(offset, params);
                let p = push_param(offset, params, Value::Int(*value));
                format!("({}) {} {}", inner, op.as_sql(), p)
            }
            Self::And(filters) => match filters.len() {
                0 => "TRUE".to_string(),
                1 => filters[0].to_sql_with_params(offset, params),
                _ => {
                    let parts: Vec<String> = filters
                        .iter()
                        .map(|f| f.to_sql_with_params(offset, params))
                        .collect();
                    format!("({})", parts.join(" AND "))
                }
            },
        }
    }
}

/// Join filters into a WHERE clause (without the keyword).
///
/// Returns `None` when there is nothing to filter on.
pub fn render_where(filters: &[Filter], args: &mut Vec<Value>) -> Option<String> {
    if filters.is_empty() {
        return None;
    }
    let parts: Vec<String> = filters.iter().map(|f| f.render(args)).collect();
    Some(parts.join(" AND "))
}

/// `CAST(expr AS sql_type)`
pub fn cast(expr: &str, sql_type: &str) -> String {
    format!("CAST({} AS {})", expr, sql_type)
}

fn push_param(offset: usize, params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    format!("${}", offset + params.len())
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
