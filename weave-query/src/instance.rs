//! Resolved objects.

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue, json};

use crate::pointer::{Page, Pointer, ResourceIdentifier};
use crate::value::Value;

/// The value of one declared field on an [`Instance`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Scalar attribute.
    Attribute(Value),
    /// To-one relationship.
    Pointer(Pointer),
    /// To-many relationship.
    Page(Page),
}

impl FieldValue {
    /// Render as JSON.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Attribute(v) => v.to_json(),
            Self::Pointer(p) => serde_json::to_value(p).unwrap_or(JsonValue::Null),
            Self::Page(p) => serde_json::to_value(p).unwrap_or(JsonValue::Null),
        }
    }
}

/// A resolved object identified by `(type, id)`.
///
/// Fields appear in declaration order: attributes first, then relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    type_name: String,
    id: String,
    fields: IndexMap<String, FieldValue>,
}

impl Instance {
    /// Create an instance with no fields set.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            fields: IndexMap::new(),
        }
    }

    /// The model type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `(type, id)` identifier.
    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(&self.type_name, &self.id)
    }

    /// Set a field value.
    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Get an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key) {
            Some(FieldValue::Attribute(v)) => Some(v),
            _ => None,
        }
    }

    /// Get a to-one relationship value.
    pub fn pointer(&self, key: &str) -> Option<&Pointer> {
        match self.fields.get(key) {
            Some(FieldValue::Pointer(p)) => Some(p),
            _ => None,
        }
    }

    /// Get a to-many relationship value.
    pub fn page(&self, key: &str) -> Option<&Page> {
        match self.fields.get(key) {
            Some(FieldValue::Page(p)) => Some(p),
            _ => None,
        }
    }

    /// Iterate over fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields set.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no field is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a resource object with the given self link.
    pub fn to_resource(&self, self_link: &str) -> JsonValue {
        let mut attributes = Map::new();
        let mut relationships = Map::new();
        for (key, value) in &self.fields {
            match value {
                FieldValue::Attribute(_) => {
                    attributes.insert(key.clone(), value.to_json());
                }
                FieldValue::Pointer(_) | FieldValue::Page(_) => {
                    relationships.insert(key.clone(), value.to_json());
                }
            }
        }

        json!({
            "type": self.type_name,
            "id": self.id,
            "attributes": attributes,
            "relationships": relationships,
            "links": { "self": self_link },
        })
    }
}
