//! The generic scalar attribute.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use super::Attribute;
use super::kind::{BoolKind, DateKind, DateTimeKind, DecimalKind, IntegerKind, ScalarKind, TextKind};
use crate::error::{QueryError, QueryResult};
use crate::filter::{CompareOp, Filter, cast, qualified};
use crate::instance::Instance;
use crate::params::ParamReader;
use crate::value::{Input, Value};

/// Produces a default from the partially built instance.
pub type DefaultFn = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;

/// A scalar field of kind `K`.
#[derive(Clone)]
pub struct AttributeField<K: ScalarKind> {
    key: String,
    column: String,
    nullable: bool,
    default: Option<DefaultFn>,
    kind: K,
}

/// Boolean attribute.
pub type BoolField = AttributeField<BoolKind>;
/// Text attribute.
pub type TextField = AttributeField<TextKind>;
/// Integer attribute.
pub type IntegerField = AttributeField<IntegerKind>;
/// Decimal attribute.
pub type DecimalField = AttributeField<DecimalKind>;
/// Date attribute.
pub type DateField = AttributeField<DateKind>;
/// Timestamp attribute.
pub type DateTimeField = AttributeField<DateTimeKind>;

impl<K: ScalarKind + Default> AttributeField<K> {
    /// Create a non-nullable field whose column equals its key.
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_kind(key, K::default())
    }
}

impl<K: ScalarKind> AttributeField<K> {
    /// Create a field with an explicit kind configuration.
    pub fn with_kind(key: impl Into<String>, kind: K) -> Self {
        let key = key.into();
        Self {
            column: key.clone(),
            key,
            nullable: false,
            default: None,
            kind,
        }
    }

    /// Store under a different column name.
    pub fn column_name(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Accept null.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Use a constant default on create.
    pub fn with_default(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default_with(move |_| value.clone())
    }

    /// Compute the default on create from the partial instance.
    pub fn default_with(mut self, f: impl Fn(&Instance) -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(f));
        self
    }

    /// The kind configuration.
    pub fn kind(&self) -> &K {
        &self.kind
    }

    fn literal(&self, param: &str, raw: &str) -> QueryResult<Value> {
        self.kind
            .parse_literal(raw)
            .map_err(|msg| QueryError::invalid_filter(param, msg))
    }

    fn read(&self, reader: &mut ParamReader<'_>, suffix: &str) -> QueryResult<Option<Value>> {
        let param = self.param(suffix);
        reader
            .single(&param)?
            .map(|raw| self.literal(&param, raw))
            .transpose()
    }

    fn param(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.key.clone()
        } else {
            format!("{}__{}", self.key, suffix)
        }
    }

    fn check(&self, value: &Value) -> QueryResult<()> {
        if !self.kind.accepts(value) {
            return Err(QueryError::invalid_value(
                &self.key,
                format!("expected {}, got {}", K::NAME, value.kind_name()),
            ));
        }
        self.kind
            .check(value)
            .map_err(|msg| QueryError::invalid_value(&self.key, msg))
    }

    fn require_non_null(&self) -> QueryResult<()> {
        if self.nullable {
            Ok(())
        } else {
            Err(QueryError::invalid_value(&self.key, "cannot be null")
                .with_help("The field is declared non-nullable"))
        }
    }
}

/// Reject `upper` strictly below `lower`.
fn check_range(
    key: &str,
    upper: (&str, Option<&Value>),
    lower: (&str, Option<&Value>),
) -> QueryResult<()> {
    if let ((upper_name, Some(u)), (lower_name, Some(l))) = (upper, lower) {
        if u.compare(l) == Some(Ordering::Less) {
            return Err(QueryError::invalid_filter(
                format!("{}__{}", key, upper_name),
                format!(
                    "upper bound {} is below {}__{}={}",
                    u, key, lower_name, l
                ),
            ));
        }
    }
    Ok(())
}

impl<K: ScalarKind> Attribute for AttributeField<K> {
    fn key(&self) -> &str {
        &self.key
    }

    fn column(&self) -> &str {
        &self.column
    }

    fn nullable(&self) -> bool {
        self.nullable
    }

    fn kind_name(&self) -> &'static str {
        K::NAME
    }

    fn decode(&self, raw: &Value) -> QueryResult<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        self.kind
            .decode(raw)
            .map_err(|msg| QueryError::decode(&self.key, msg))
    }

    fn sort_expr(&self, table: &str) -> String {
        let column = qualified(table, &self.column);
        match K::SQL_CAST {
            Some(sql_type) => cast(&column, sql_type),
            None => column,
        }
    }

    fn compile_filters(
        &self,
        table: &str,
        reader: &mut ParamReader<'_>,
    ) -> QueryResult<Vec<Filter>> {
        let column = qualified(table, &self.column);

        let is_null = if self.nullable {
            reader.flag(&self.param("is_null"))?
        } else {
            None
        };
        let exact = self.read(reader, "")?;

        let (lt, gt) = if K::ORDERED {
            (self.read(reader, "lt")?, self.read(reader, "gt")?)
        } else {
            (None, None)
        };
        let (before, after) = if K::TEMPORAL {
            (self.read(reader, "before")?, self.read(reader, "after")?)
        } else {
            (None, None)
        };
        let (length, length_lt, length_gt, contains) = if K::TEXTUAL {
            (
                reader.count(&self.param("length"))?,
                reader.count(&self.param("length__lt"))?,
                reader.count(&self.param("length__gt"))?,
                reader.single(&self.param("contains"))?,
            )
        } else {
            (None, None, None, None)
        };

        let compares = exact.is_some()
            || lt.is_some()
            || gt.is_some()
            || before.is_some()
            || after.is_some()
            || length.is_some()
            || length_lt.is_some()
            || length_gt.is_some()
            || contains.is_some();
        if is_null == Some(true) && compares {
            return Err(QueryError::invalid_filter(
                self.param("is_null"),
                "is_null=true cannot be combined with a comparison on the same field",
            ));
        }

        check_range(&self.key, ("lt", lt.as_ref()), ("gt", gt.as_ref()))?;
        check_range(&self.key, ("before", before.as_ref()), ("after", after.as_ref()))?;
        let length_lt_value = length_lt.map(Value::Int);
        let length_gt_value = length_gt.map(Value::Int);
        check_range(
            &self.key,
            ("length__lt", length_lt_value.as_ref()),
            ("length__gt", length_gt_value.as_ref()),
        )?;

        let mut filters = Vec::new();
        if let Some(is_null) = is_null {
            filters.push(Filter::IsNull {
                column: column.clone(),
                is_null,
            });
        }
        let compare = |op, value| match K::SQL_CAST {
            Some(sql_type) => Filter::CastCompare {
                column: column.clone(),
                sql_type,
                op,
                value,
            },
            None => Filter::Compare {
                column: column.clone(),
                op,
                value,
            },
        };
        if let Some(value) = exact {
            filters.push(compare(CompareOp::Eq, value));
        }
        for (op, value) in [
            (CompareOp::Lt, lt),
            (CompareOp::Gt, gt),
            (CompareOp::Lt, before),
            (CompareOp::Gt, after),
        ] {
            if let Some(value) = value {
                filters.push(compare(op, value));
            }
        }
        for (op, value) in [
            (CompareOp::Eq, length),
            (CompareOp::Lt, length_lt),
            (CompareOp::Gt, length_gt),
        ] {
            if let Some(value) = value {
                filters.push(Filter::Length {
                    column: column.clone(),
                    op,
                    value,
                });
            }
        }
        if let Some(needle) = contains {
            filters.push(Filter::Contains {
                column: column.clone(),
                needle: needle.to_string(),
            });
        }

        Ok(filters)
    }

    fn parse_literal(&self, param: &str, raw: &str) -> QueryResult<Value> {
        self.literal(param, raw)
    }

    fn default_value(&self, partial: &Instance) -> QueryResult<Value> {
        let Some(default) = &self.default else {
            return Ok(Value::Null);
        };
        let value = default(partial);
        if value.is_null() || self.kind.accepts(&value) {
            Ok(value)
        } else {
            Err(QueryError::malformed_default(
                &self.key,
                format!("expected {}, got {}", K::NAME, value.kind_name()),
            ))
        }
    }

    fn decode_input(&self, json: &JsonValue) -> QueryResult<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        self.kind
            .from_json(json)
            .map_err(|msg| QueryError::invalid_value(&self.key, msg))
    }

    fn validate_create(&self, input: Input<Value>, partial: &Instance) -> QueryResult<Value> {
        let value = match input {
            Input::Unset => Attribute::default_value(self, partial)?,
            Input::Null => Value::Null,
            Input::Value(v) => v,
        };
        if value.is_null() {
            self.require_non_null()?;
            return Ok(Value::Null);
        }
        self.check(&value)?;
        Ok(value)
    }

    fn validate_update(&self, old: &Value, input: Input<Value>) -> QueryResult<Input<Value>> {
        match input {
            Input::Unset => Ok(Input::Unset),
            Input::Null | Input::Value(Value::Null) => {
                self.require_non_null()?;
                if old.is_null() {
                    Ok(Input::Unset)
                } else {
                    Ok(Input::Null)
                }
            }
            Input::Value(value) => {
                self.check(&value)?;
                if &value == old {
                    Ok(Input::Unset)
                } else {
                    Ok(Input::Value(value))
                }
            }
        }
    }
}

impl<K: ScalarKind> fmt::Debug for AttributeField<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeField")
            .field("key", &self.key)
            .field("column", &self.column)
            .field("nullable", &self.nullable)
            .field("has_default", &self.default.is_some())
            .field("kind", &self.kind)
            .finish()
    }
}

impl TextField {
    /// Require at least `n` characters.
    pub fn min_len(mut self, n: usize) -> Self {
        self.kind.min_len = Some(n);
        self
    }

    /// Allow at most `n` characters.
    pub fn max_len(mut self, n: usize) -> Self {
        self.kind.max_len = Some(n);
        self
    }
}

impl IntegerField {
    /// Inclusive lower bound.
    pub fn min(mut self, n: i64) -> Self {
        self.kind.min = Some(n);
        self
    }

    /// Inclusive upper bound.
    pub fn max(mut self, n: i64) -> Self {
        self.kind.max = Some(n);
        self
    }
}

impl DecimalField {
    /// Inclusive lower bound.
    pub fn min(mut self, d: Decimal) -> Self {
        self.kind.min = Some(d);
        self
    }

    /// Inclusive upper bound.
    pub fn max(mut self, d: Decimal) -> Self {
        self.kind.max = Some(d);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::QueryParams;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compile(field: &dyn Attribute, query: &str) -> QueryResult<Vec<Filter>> {
        let params = QueryParams::parse(query);
        let mut reader = ParamReader::new(&params);
        let filters = field.compile_filters("books", &mut reader)?;
        reader.finish("books")?;
        Ok(filters)
    }

    #[test]
    fn test_exact_and_range() {
        let pages = IntegerField::new("pages").nullable();
        let filters = compile(&pages, "pages__gt=100&pages__lt=300").unwrap();
        assert_eq!(
            filters,
            vec![
                Filter::Compare {
                    column: qualified("books", "pages"),
                    op: CompareOp::Lt,
                    value: Value::Int(300),
                },
                Filter::Compare {
                    column: qualified("books", "pages"),
                    op: CompareOp::Gt,
                    value: Value::Int(100),
                },
            ]
        );
    }

    #[test]
    fn test_is_null_excludes_comparisons() {
        let pages = IntegerField::new("pages").nullable();
        let err = compile(&pages, "pages=3&pages__is_null=true").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.context.field.as_deref(), Some("pages__is_null"));

        // is_null=false narrows rather than contradicts
        assert_eq!(compile(&pages, "pages=3&pages__is_null=false").unwrap().len(), 2);
    }

    #[test]
    fn test_is_null_needs_nullable_field() {
        let title = TextField::new("title");
        let err = compile(&title, "title__is_null=true").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let published = DateField::new("published");
        let err = compile(&published, "published__before=2020-01-01&published__after=2021-01-01")
            .unwrap_err();
        assert_eq!(err.context.field.as_deref(), Some("published__before"));

        // equal bounds are allowed
        assert!(compile(&published, "published__before=2020-01-01&published__after=2020-01-01").is_ok());

        let title = TextField::new("title");
        assert!(compile(&title, "title__length__lt=2&title__length__gt=5").is_err());
    }

    #[test]
    fn test_bad_literal_names_parameter() {
        let price = DecimalField::new("price");
        let err = compile(&price, "price__gt=cheap").unwrap_err();
        assert_eq!(err.context.field.as_deref(), Some("price__gt"));
        assert!(err.message.contains("cheap"));
    }

    #[test]
    fn test_decimal_compares_numerically() {
        let price = DecimalField::new("price").nullable();
        let filters = compile(&price, "price=9.990&price__lt=20").unwrap();
        assert_eq!(
            filters,
            vec![
                Filter::CastCompare {
                    column: qualified("books", "price"),
                    sql_type: "NUMERIC",
                    op: CompareOp::Eq,
                    value: Value::Decimal(Decimal::new(9990, 3)),
                },
                Filter::CastCompare {
                    column: qualified("books", "price"),
                    sql_type: "NUMERIC",
                    op: CompareOp::Lt,
                    value: Value::Decimal(Decimal::new(20, 0)),
                },
            ]
        );
        assert_eq!(price.sort_expr("books"), r#"CAST("books"."price" AS NUMERIC)"#);
        assert_eq!(
            IntegerField::new("pages").sort_expr("books"),
            r#""books"."pages""#
        );
    }

    #[test]
    fn test_suffix_support_follows_kind() {
        let in_print = BoolField::new("in_print");
        assert!(compile(&in_print, "in_print__lt=true").is_err());
        assert!(compile(&in_print, "in_print=true").is_ok());

        let title = TextField::new("title");
        let filters = compile(&title, "title__contains=war&title__length__gt=3").unwrap();
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn test_validate_create_uses_default() {
        let mut partial = Instance::new("books", "1");
        partial.set("title", crate::instance::FieldValue::Attribute(Value::from("Dune")));

        let slug = TextField::new("slug").default_with(|partial| match partial.attribute("title") {
            Some(Value::Text(t)) => Value::Text(t.to_lowercase()),
            _ => Value::Null,
        });
        assert_eq!(
            slug.validate_create(Input::Unset, &partial).unwrap(),
            Value::from("dune")
        );
    }

    #[test]
    fn test_malformed_default_is_invariant() {
        let pages = IntegerField::new("pages").with_default("many");
        let err = pages
            .validate_create(Input::Unset, &Instance::new("books", "1"))
            .unwrap_err();
        assert!(err.is_invariant());
    }

    #[test]
    fn test_validate_create_rules() {
        let partial = Instance::new("books", "1");
        let title = TextField::new("title").max_len(5);
        assert!(title.validate_create(Input::Null, &partial).is_err());
        assert!(title.validate_create(Input::Unset, &partial).is_err());
        assert!(title.validate_create(Input::Value(Value::from("too long")), &partial).is_err());
        assert!(title.validate_create(Input::Value(Value::Int(3)), &partial).is_err());
    }

    #[test]
    fn test_validate_update_tristate() {
        let pages = IntegerField::new("pages").nullable();
        let old = Value::Int(10);
        assert_eq!(pages.validate_update(&old, Input::Unset).unwrap(), Input::Unset);
        assert_eq!(pages.validate_update(&old, Input::Null).unwrap(), Input::Null);
        assert_eq!(
            pages.validate_update(&old, Input::Value(Value::Int(10))).unwrap(),
            Input::Unset
        );
        assert_eq!(
            pages.validate_update(&old, Input::Value(Value::Int(11))).unwrap(),
            Input::Value(Value::Int(11))
        );
        assert_eq!(
            pages.validate_update(&Value::Null, Input::Null).unwrap(),
            Input::Unset
        );
    }

    #[test]
    fn test_decode_input() {
        let price = DecimalField::new("price");
        assert_eq!(
            price.decode_input(&json!("9.99")).unwrap(),
            Value::Decimal(Decimal::new(999, 2))
        );
        assert_eq!(price.decode_input(&json!(null)).unwrap(), Value::Null);
        assert!(price.decode_input(&json!(true)).is_err());
    }
}
