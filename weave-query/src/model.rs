//! Model descriptors and the registry.
//!
//! ```rust
//! use weave_query::fields::{IntegerField, TextField};
//! use weave_query::model::{ModelDescriptor, Registry};
//! use weave_query::relations::{DirectRelation, ReverseRelation};
//!
//! let registry = Registry::builder()
//!     .model(
//!         ModelDescriptor::builder("authors", "authors")
//!             .attribute(TextField::new("name"))
//!             .relationship(ReverseRelation::new("books", "books", "author_id")),
//!     )
//!     .model(
//!         ModelDescriptor::builder("books", "books")
//!             .attribute(TextField::new("title"))
//!             .attribute(IntegerField::new("pages").nullable())
//!             .relationship(DirectRelation::new("author", "authors", "author_id")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let books = registry.model("books").unwrap();
//! assert_eq!(books.route(), "books");
//! assert!(books.relationship("author").is_some());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{QueryError, QueryResult};
use crate::fields::Attribute;
use crate::filter::qualified;
use crate::instance::Instance;
use crate::relations::{Relationship, Targets};
use crate::types::{OrderBy, OrderByField, SortOrder};

/// Field keys that clash with resource object members.
const RESERVED_KEYS: &[&str] = &["id", "type"];

/// Immutable description of one model.
pub struct ModelDescriptor {
    type_name: String,
    table: String,
    id_column: String,
    route: String,
    attributes: Vec<Arc<dyn Attribute>>,
    relationships: Vec<Arc<dyn Relationship>>,
    default_order: OrderBy,
    page_size: Option<u64>,
}

impl ModelDescriptor {
    /// Start describing a model stored in `table`.
    pub fn builder(type_name: impl Into<String>, table: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(type_name, table)
    }

    /// Unique type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Storage table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary-key column.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// The quoted `table.id` reference.
    pub fn id_ref(&self) -> String {
        qualified(&self.table, &self.id_column)
    }

    /// URL path segment.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[Arc<dyn Attribute>] {
        &self.attributes
    }

    /// Relationships in declaration order.
    pub fn relationships(&self) -> &[Arc<dyn Relationship>] {
        &self.relationships
    }

    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&Arc<dyn Attribute>> {
        self.attributes.iter().find(|a| a.key() == key)
    }

    /// Look up a relationship by key.
    pub fn relationship(&self, key: &str) -> Option<&Arc<dyn Relationship>> {
        self.relationships.iter().find(|r| r.key() == key)
    }

    /// Ordering used when a request does not sort.
    pub fn default_order(&self) -> &OrderBy {
        &self.default_order
    }

    /// Page size override for collections of this model.
    pub fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    /// A fresh instance with no fields set.
    pub fn instantiate(&self, id: impl Into<String>) -> Instance {
        Instance::new(&self.type_name, id)
    }

    /// Render `order` as ORDER BY terms, ending with the id as tiebreaker.
    pub fn order_terms(&self, order: &OrderBy) -> QueryResult<Vec<String>> {
        let mut terms = Vec::new();
        let mut has_id = false;
        for field in order.iter() {
            let expr = if field.field == "id" {
                has_id = true;
                self.id_ref()
            } else {
                self.attribute(&field.field)
                    .ok_or_else(|| {
                        QueryError::invalid_sort(&field.field, "not an attribute")
                            .with_model(&self.type_name)
                    })?
                    .sort_expr(&self.table)
            };
            terms.push(format!("{} {}", expr, field.order.as_sql()));
        }
        if !has_id {
            terms.push(format!("{} {}", self.id_ref(), SortOrder::Asc.as_sql()));
        }
        Ok(terms)
    }

    /// Check that every key of `order` is sortable on this model.
    pub fn check_order(&self, order: &OrderBy) -> QueryResult<()> {
        self.order_terms(order).map(|_| ())
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .field("route", &self.route)
            .field(
                "attributes",
                &self.attributes.iter().map(|a| a.key()).collect::<Vec<_>>(),
            )
            .field(
                "relationships",
                &self.relationships.iter().map(|r| r.key()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`ModelDescriptor`].
pub struct ModelBuilder {
    type_name: String,
    table: String,
    id_column: String,
    route: Option<String>,
    attributes: Vec<Arc<dyn Attribute>>,
    relationships: Vec<Arc<dyn Relationship>>,
    default_order: OrderBy,
    page_size: Option<u64>,
}

impl ModelBuilder {
    fn new(type_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: table.into(),
            id_column: "id".to_string(),
            route: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
            default_order: OrderBy::none(),
            page_size: None,
        }
    }

    /// Primary-key column (default `id`).
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// URL path segment (default: the type name).
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Declare an attribute.
    pub fn attribute(mut self, attribute: impl Attribute + 'static) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    /// Declare a relationship.
    pub fn relationship(mut self, relationship: impl Relationship + 'static) -> Self {
        self.relationships.push(Arc::new(relationship));
        self
    }

    /// Default ordering, e.g. `OrderBy::parse("-published")`.
    pub fn default_order(mut self, order: impl Into<OrderBy>) -> Self {
        self.default_order = order.into();
        self
    }

    /// Add an ascending term to the default ordering.
    pub fn order_by(mut self, key: impl Into<String>) -> Self {
        self.default_order = self.default_order.then(OrderByField::asc(key));
        self
    }

    /// Page size for collections of this model.
    pub fn page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Validate and finish the descriptor.
    pub fn build(self) -> QueryResult<ModelDescriptor> {
        let mut seen = HashSet::new();
        let keys = self
            .attributes
            .iter()
            .map(|a| a.key())
            .chain(self.relationships.iter().map(|r| r.key()));
        for key in keys {
            if RESERVED_KEYS.contains(&key) {
                return Err(QueryError::configuration(format!(
                    "{}: field key '{}' is reserved",
                    self.type_name, key
                )));
            }
            if !seen.insert(key) {
                return Err(QueryError::configuration(format!(
                    "{}: field key '{}' is declared twice",
                    self.type_name, key
                )));
            }
        }
        if self.page_size == Some(0) {
            return Err(QueryError::configuration(format!(
                "{}: page size must be at least 1",
                self.type_name
            )));
        }

        let descriptor = ModelDescriptor {
            route: self.route.unwrap_or_else(|| self.type_name.clone()),
            type_name: self.type_name,
            table: self.table,
            id_column: self.id_column,
            attributes: self.attributes,
            relationships: self.relationships,
            default_order: self.default_order,
            page_size: self.page_size,
        };
        descriptor.check_order(&descriptor.default_order).map_err(|e| {
            QueryError::configuration(format!(
                "{}: default order is invalid: {}",
                descriptor.type_name, e.message
            ))
        })?;
        Ok(descriptor)
    }
}

/// Immutable map from type name to model.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: IndexMap<String, Arc<ModelDescriptor>>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a model; a miss is an unknown-model error.
    pub fn model(&self, type_name: &str) -> QueryResult<&Arc<ModelDescriptor>> {
        self.models.get(type_name).ok_or_else(|| {
            QueryError::unknown_model(type_name)
                .with_suggestion(format!("Registered types: {}", self.type_names().join(", ")))
        })
    }

    /// Look up a model.
    pub fn get(&self, type_name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models.get(type_name)
    }

    /// Look up a model by its route segment.
    pub fn by_route(&self, route: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models.values().find(|m| m.route() == route)
    }

    /// Registered type names in registration order.
    pub fn type_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Iterate over models.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.models.values()
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Collects models, then validates cross-references once.
#[derive(Default)]
pub struct RegistryBuilder {
    models: Vec<QueryResult<ModelDescriptor>>,
}

impl RegistryBuilder {
    /// Add a model; builder errors surface from [`build`](Self::build).
    pub fn model(mut self, model: ModelBuilder) -> Self {
        self.models.push(model.build());
        self
    }

    /// Add an already built model.
    pub fn descriptor(mut self, model: ModelDescriptor) -> Self {
        self.models.push(Ok(model));
        self
    }

    /// Validate and freeze the registry.
    pub fn build(self) -> QueryResult<Registry> {
        let mut models = IndexMap::new();
        for model in self.models {
            let model = model?;
            if models.contains_key(model.type_name()) {
                return Err(QueryError::configuration(format!(
                    "type '{}' is registered twice",
                    model.type_name()
                )));
            }
            models.insert(model.type_name().to_string(), Arc::new(model));
        }

        for model in models.values() {
            for rel in model.relationships() {
                let declared = match rel.targets() {
                    Targets::Any => continue,
                    targets => targets.declared(),
                };
                if let Some(missing) = declared.iter().find(|t| !models.contains_key(**t)) {
                    return Err(QueryError::configuration(format!(
                        "{}.{} targets unregistered type '{}'",
                        model.type_name(),
                        rel.key(),
                        missing
                    )));
                }
            }
        }

        Ok(Registry { models })
    }
}
