//! Relationship descriptors.
//!
//! Five variants share the [`Relationship`] capability set:
//!
//! | Variant | Storage | Value |
//! |---|---|---|
//! | [`DirectRelation`] | FK column on the owner table | [`Pointer`] |
//! | [`PolymorphicRelation`] | type + id columns on the owner table | [`Pointer`] |
//! | [`ReverseRelation`] | FK column on the target table | [`Page`] |
//! | [`ManyToManyRelation`] | join table | [`Page`] |
//! | [`PolymorphicReverseRelation`] | type + id columns on the target table | [`Page`] |
//!
//! To-one variants resolve from columns carried by the owner's base scan and
//! never query. Collection variants issue one windowed query per owner batch.

mod collection;
mod direct;
mod many_to_many;
mod polymorphic;
mod polymorphic_reverse;
mod reverse;

pub use direct::DirectRelation;
pub use many_to_many::ManyToManyRelation;
pub use polymorphic::PolymorphicRelation;
pub use polymorphic_reverse::PolymorphicReverseRelation;
pub use reverse::ReverseRelation;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use indexmap::IndexSet;
use serde_json::Value as JsonValue;

use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::instance::FieldValue;
use crate::model::{ModelDescriptor, Registry};
use crate::pagination::{PageLinks, PageRequest};
use crate::params::ParamReader;
use crate::pointer::{Page, Pointer, ResourceIdentifier};
use crate::relation_map::OwnerRelations;
use crate::server::Server;
use crate::store::{Persistence, Statement};
use crate::value::Value;

/// Relationship variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// FK on the owner.
    Direct,
    /// FK on the target.
    Reverse,
    /// Join table.
    ManyToMany,
    /// Type and id on the owner.
    Polymorphic,
    /// Type and id on the target.
    PolymorphicReverse,
}

impl RelationKind {
    /// Check if the value is a paginated collection.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::Reverse | Self::ManyToMany | Self::PolymorphicReverse
        )
    }

    /// Check if the target type is data-determined.
    pub fn is_polymorphic(&self) -> bool {
        matches!(self, Self::Polymorphic)
    }
}

/// Target types a relationship may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Targets<'a> {
    /// Exactly one type.
    One(&'a str),
    /// One of a declared set.
    Restricted(&'a [String]),
    /// Any registered type.
    Any,
}

impl<'a> Targets<'a> {
    /// Check if `type_name` is an acceptable target.
    pub fn allows(&self, type_name: &str) -> bool {
        match *self {
            Self::One(t) => t == type_name,
            Self::Restricted(types) => types.iter().any(|t| t == type_name),
            Self::Any => true,
        }
    }

    /// Types known without looking at data.
    pub fn declared(&self) -> Vec<&'a str> {
        match *self {
            Self::One(t) => vec![t],
            Self::Restricted(types) => types.iter().map(String::as_str).collect(),
            Self::Any => Vec::new(),
        }
    }
}

/// One base row as seen by relationships: the id plus extra columns.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerRow {
    /// Owner id.
    pub id: String,
    /// Extra column values by column name.
    pub extras: HashMap<String, Value>,
}

impl OwnerRow {
    /// Create a row with no extras.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extras: HashMap::new(),
        }
    }

    /// Builder for an extra column.
    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(column.into(), value.into());
        self
    }

    /// Extra column value; missing columns read as null.
    pub fn extra(&self, column: &str) -> &Value {
        self.extras.get(column).unwrap_or(&Value::Null)
    }
}

/// The owner batch handed to [`Relationship::resolve`].
///
/// Rows are kept as loaded, so an id can appear more than once when storage
/// returns duplicate base rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerRows {
    rows: Vec<OwnerRow>,
}

impl OwnerRows {
    /// Create a batch.
    pub fn new(rows: Vec<OwnerRow>) -> Self {
        Self { rows }
    }

    /// Rows in load order.
    pub fn rows(&self) -> &[OwnerRow] {
        &self.rows
    }

    /// Distinct owner ids in load order.
    pub fn ids(&self) -> Vec<String> {
        let ids: IndexSet<&str> = self.rows.iter().map(|r| r.id.as_str()).collect();
        ids.into_iter().map(str::to_string).collect()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<OwnerRow> for OwnerRows {
    fn from_iter<I: IntoIterator<Item = OwnerRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// What a relationship needs while resolving one batch.
pub struct ResolveContext<'a> {
    /// Engine context.
    pub server: &'a Server,
    /// Storage.
    pub store: &'a dyn Persistence,
    /// The owner model.
    pub owner: &'a ModelDescriptor,
    /// Explicit page for collection values; `None` means the first page.
    pub page: Option<PageRequest>,
}

/// Values and references produced by one relationship for a batch.
#[derive(Debug, Clone, Default)]
pub struct RelationBatch {
    /// Value per owner id. Owners without an entry get the default value.
    pub values: HashMap<String, FieldValue>,
    /// References per owner id.
    pub relations: OwnerRelations,
}

/// Decoded relationship member of a write payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationInput {
    /// To-one linkage; `None` clears it.
    One(Option<ResourceIdentifier>),
    /// Full replacement of a to-many linkage.
    Many(Vec<ResourceIdentifier>),
}

/// Ids that must exist before a write commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceCheck {
    /// Relationship being written.
    pub key: String,
    /// Referenced type.
    pub type_name: String,
    /// Referenced ids.
    pub ids: Vec<String>,
}

/// Storage changes for one relationship member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePlan {
    /// Owner-table column assignments.
    pub columns: Vec<(String, Value)>,
    /// Statements to run after the owner row is written.
    pub statements: Vec<Statement>,
    /// References to verify.
    pub checks: Vec<ExistenceCheck>,
}

/// The capability set shared by relationship fields.
#[async_trait]
pub trait Relationship: Send + Sync + fmt::Debug {
    /// Field key as exposed to clients.
    fn key(&self) -> &str;

    /// Variant.
    fn kind(&self) -> RelationKind;

    /// Acceptable target types.
    fn targets(&self) -> Targets<'_>;

    /// Owner-table columns the base scan must carry.
    fn extra_columns(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Page size override for collection values.
    fn page_size(&self) -> Option<u64> {
        None
    }

    /// The value of an owner this relationship produced nothing for.
    fn default_value(&self, server: &Server, owner: &ModelDescriptor, owner_id: &str) -> FieldValue {
        let link = server.relationship_link(owner, owner_id, self.key());
        if self.kind().is_collection() {
            let size = self.page_size().unwrap_or_else(|| server.indirect_page_size());
            FieldValue::Page(Page::new(
                PageLinks::build(&link, 1, size, size, 0),
                0,
                Vec::new(),
            ))
        } else {
            FieldValue::Pointer(Pointer::new(link, None))
        }
    }

    /// Compile this relationship's filter parameters.
    fn compile_filters(
        &self,
        owner: &ModelDescriptor,
        registry: &Registry,
        reader: &mut ParamReader<'_>,
    ) -> QueryResult<Vec<Filter>>;

    /// Produce values for a whole owner batch with at most one query.
    async fn resolve(&self, ctx: &ResolveContext<'_>, owners: &OwnerRows)
    -> QueryResult<RelationBatch>;

    /// Decode the relationship member of a write payload.
    fn decode_input(&self, registry: &Registry, json: &JsonValue) -> QueryResult<RelationInput>;

    /// Plan the storage changes for a decoded member.
    fn plan_write(
        &self,
        registry: &Registry,
        owner: &ModelDescriptor,
        owner_id: &str,
        input: RelationInput,
    ) -> QueryResult<WritePlan>;

    /// Statements to run before the owner row is deleted.
    fn plan_delete(
        &self,
        _registry: &Registry,
        _owner: &ModelDescriptor,
        _owner_id: &str,
    ) -> QueryResult<Vec<Statement>> {
        Ok(Vec::new())
    }
}

/// Unwrap the `data` member of a relationship payload.
pub(crate) fn data_member<'j>(key: &str, json: &'j JsonValue) -> QueryResult<&'j JsonValue> {
    json.as_object()
        .and_then(|obj| obj.get("data"))
        .ok_or_else(|| QueryError::invalid_value(key, "expected an object with a data member"))
}

/// Decode a `{type, id}` object.
pub(crate) fn identifier(key: &str, json: &JsonValue) -> QueryResult<ResourceIdentifier> {
    let obj = json
        .as_object()
        .ok_or_else(|| QueryError::invalid_value(key, format!("expected {{type, id}}, got {}", json)))?;
    let type_name = obj
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| QueryError::invalid_value(key, "identifier is missing a string type"))?;
    let id = match obj.get("id") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => {
            return Err(QueryError::invalid_value(key, "identifier is missing an id"));
        }
    };
    Ok(ResourceIdentifier::new(type_name, id))
}

/// Decode a to-one linkage whose type must satisfy `targets`.
pub(crate) fn decode_one(
    key: &str,
    targets: Targets<'_>,
    registry: &Registry,
    json: &JsonValue,
) -> QueryResult<RelationInput> {
    let data = data_member(key, json)?;
    if data.is_null() {
        return Ok(RelationInput::One(None));
    }
    let ident = identifier(key, data)?;
    check_target(key, targets, registry, &ident)?;
    Ok(RelationInput::One(Some(ident)))
}

/// Decode a to-many linkage whose members must all be of `target`.
pub(crate) fn decode_many(key: &str, target: &str, json: &JsonValue) -> QueryResult<RelationInput> {
    let data = data_member(key, json)?;
    let items = data
        .as_array()
        .ok_or_else(|| QueryError::invalid_value(key, "expected an array of identifiers"))?;
    let mut idents = Vec::with_capacity(items.len());
    for item in items {
        let ident = identifier(key, item)?;
        if ident.type_name != target {
            return Err(QueryError::invalid_value(
                key,
                format!("expected type {}, got {}", target, ident.type_name),
            ));
        }
        idents.push(ident);
    }
    Ok(RelationInput::Many(idents))
}

fn check_target(
    key: &str,
    targets: Targets<'_>,
    registry: &Registry,
    ident: &ResourceIdentifier,
) -> QueryResult<()> {
    if !targets.allows(&ident.type_name) || registry.get(&ident.type_name).is_none() {
        return Err(QueryError::invalid_value(
            key,
            format!("{} is not a valid target type", ident.type_name),
        ));
    }
    Ok(())
}

/// Reject an input of the wrong arity.
pub(crate) fn arity_mismatch(key: &str) -> QueryError {
    QueryError::invalid_value(key, "linkage does not match the relationship's arity")
}
