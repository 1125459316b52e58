//! Relationship value shapes.

use serde::{Deserialize, Serialize};

use crate::pagination::{PageLinks, PageMeta};

/// A `(type, id)` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Model type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Opaque id.
    pub id: String,
}

impl ResourceIdentifier {
    /// Create an identifier.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

/// Links carried by a to-one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerLinks {
    /// The relationship endpoint.
    #[serde(rename = "self")]
    pub self_link: String,
}

/// A to-one relationship value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    /// Navigation links.
    pub links: PointerLinks,
    /// The referenced resource, or null.
    pub data: Option<ResourceIdentifier>,
}

impl Pointer {
    /// Create a pointer.
    pub fn new(self_link: impl Into<String>, data: Option<ResourceIdentifier>) -> Self {
        Self {
            links: PointerLinks {
                self_link: self_link.into(),
            },
            data,
        }
    }
}

/// A to-many relationship value: one page of references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Navigation links.
    pub links: PageLinks,
    /// Totals.
    pub meta: PageMeta,
    /// References on this page.
    pub data: Vec<ResourceIdentifier>,
}

impl Page {
    /// Create a page; `meta.count` is taken from `data`.
    pub fn new(links: PageLinks, total: u64, data: Vec<ResourceIdentifier>) -> Self {
        Self {
            links,
            meta: PageMeta {
                total,
                count: data.len() as u64,
            },
            data,
        }
    }
}
