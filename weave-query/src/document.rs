//! Response documents.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::instance::Instance;
use crate::pagination::{PageLinks, PageMeta};
use crate::server::Server;

/// Primary data of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryData {
    /// A single resource, or null.
    One(Option<Arc<Instance>>),
    /// A collection page.
    Many(Vec<Arc<Instance>>),
}

impl PrimaryData {
    /// The primary instances as a slice-like list.
    pub fn instances(&self) -> Vec<&Arc<Instance>> {
        match self {
            Self::One(one) => one.iter().collect(),
            Self::Many(many) => many.iter().collect(),
        }
    }
}

/// A top-level response document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Primary data.
    pub data: PrimaryData,
    /// Related instances, each at most once and never repeating primary data.
    pub included: Vec<Arc<Instance>>,
    /// Collection links.
    pub links: Option<PageLinks>,
    /// Collection totals.
    pub meta: Option<PageMeta>,
}

impl Document {
    /// A single-resource document.
    pub fn one(instance: Arc<Instance>, included: Vec<Arc<Instance>>) -> Self {
        let included = dedup_included(std::slice::from_ref(&instance), included);
        Self {
            data: PrimaryData::One(Some(instance)),
            included,
            links: None,
            meta: None,
        }
    }

    /// A collection document.
    pub fn many(
        instances: Vec<Arc<Instance>>,
        included: Vec<Arc<Instance>>,
        links: PageLinks,
        meta: PageMeta,
    ) -> Self {
        let included = dedup_included(&instances, included);
        Self {
            data: PrimaryData::Many(instances),
            included,
            links: Some(links),
            meta: Some(meta),
        }
    }

    /// The single primary instance, if this is a single-resource document.
    pub fn primary(&self) -> Option<&Arc<Instance>> {
        match &self.data {
            PrimaryData::One(one) => one.as_ref(),
            PrimaryData::Many(_) => None,
        }
    }

    /// Render as JSON.
    pub fn to_json(&self, server: &Server) -> JsonValue {
        let resource = |i: &Arc<Instance>| i.to_resource(&server.instance_link(i));

        let mut doc = Map::new();
        let data = match &self.data {
            PrimaryData::One(Some(instance)) => resource(instance),
            PrimaryData::One(None) => JsonValue::Null,
            PrimaryData::Many(instances) => instances.iter().map(resource).collect(),
        };
        doc.insert("data".to_string(), data);
        if !self.included.is_empty() {
            doc.insert(
                "included".to_string(),
                self.included.iter().map(resource).collect(),
            );
        }
        if let Some(links) = &self.links {
            doc.insert(
                "links".to_string(),
                serde_json::to_value(links).unwrap_or(JsonValue::Null),
            );
        }
        if let Some(meta) = &self.meta {
            doc.insert(
                "meta".to_string(),
                serde_json::to_value(meta).unwrap_or(JsonValue::Null),
            );
        }
        JsonValue::Object(doc)
    }
}

/// Drop included instances that repeat an earlier one or the primary data.
pub fn dedup_included(
    primary: &[Arc<Instance>],
    included: Vec<Arc<Instance>>,
) -> Vec<Arc<Instance>> {
    let mut seen: HashSet<(String, String)> = primary
        .iter()
        .map(|i| (i.type_name().to_string(), i.id().to_string()))
        .collect();
    included
        .into_iter()
        .filter(|i| seen.insert((i.type_name().to_string(), i.id().to_string())))
        .collect()
}
