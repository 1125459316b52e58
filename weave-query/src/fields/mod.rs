//! Attribute descriptors.
//!
//! Every scalar field implements [`Attribute`]. The six kinds share one
//! generic implementation, [`AttributeField`], parameterised by a
//! [`ScalarKind`] that knows how to parse, decode and check its values.
//!
//! ```rust
//! use weave_query::fields::{Attribute, IntegerField, TextField};
//!
//! let title = TextField::new("title").max_len(200);
//! let pages = IntegerField::new("pages").nullable().min(1);
//!
//! assert_eq!(title.column(), "title");
//! assert!(Attribute::nullable(&pages));
//! assert_eq!(pages.kind_name(), "integer");
//! ```

mod attribute;
mod kind;

pub use attribute::{
    AttributeField, BoolField, DateField, DateTimeField, DecimalField, DefaultFn, IntegerField,
    TextField,
};
pub use kind::{BoolKind, DateKind, DateTimeKind, DecimalKind, IntegerKind, ScalarKind, TextKind};

use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::QueryResult;
use crate::filter::{Filter, qualified};
use crate::instance::Instance;
use crate::params::ParamReader;
use crate::value::{Input, Value};

/// The capability set shared by scalar fields.
pub trait Attribute: Send + Sync + fmt::Debug {
    /// Field key as exposed to clients.
    fn key(&self) -> &str;

    /// Storage column.
    fn column(&self) -> &str;

    /// Whether null is an accepted value.
    fn nullable(&self) -> bool;

    /// Name of the kind, for messages.
    fn kind_name(&self) -> &'static str;

    /// Decode a raw storage value.
    fn decode(&self, raw: &Value) -> QueryResult<Value>;

    /// Expression this field sorts by in `table`.
    fn sort_expr(&self, table: &str) -> String {
        qualified(table, self.column())
    }

    /// Compile this field's filter parameters against `table`.
    fn compile_filters(&self, table: &str, reader: &mut ParamReader<'_>)
    -> QueryResult<Vec<Filter>>;

    /// Parse a literal as used in a filter on this field.
    fn parse_literal(&self, param: &str, raw: &str) -> QueryResult<Value>;

    /// Produce the value used when a create omits this field.
    fn default_value(&self, partial: &Instance) -> QueryResult<Value>;

    /// Decode a JSON value from a write payload.
    fn decode_input(&self, json: &JsonValue) -> QueryResult<Value>;

    /// Validate a value for a new instance.
    fn validate_create(&self, input: Input<Value>, partial: &Instance) -> QueryResult<Value>;

    /// Validate a change against the stored value.
    ///
    /// Returns [`Input::Unset`] when the column should be left untouched.
    fn validate_update(&self, old: &Value, input: Input<Value>) -> QueryResult<Input<Value>>;
}
