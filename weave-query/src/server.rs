//! The explicit context handed to the compiler and the resolver.

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{QueryError, QueryResult};
use crate::instance::Instance;
use crate::model::{ModelDescriptor, Registry};

/// Decides whether resolved instances may be returned.
pub trait AccessPolicy: Send + Sync + fmt::Debug {
    /// Check a whole result set at once.
    fn can_access_all(&self, instances: &[Arc<Instance>]) -> bool;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn can_access_all(&self, _instances: &[Arc<Instance>]) -> bool {
        true
    }
}

/// Registry, configuration and access policy for one deployment.
#[derive(Debug, Clone)]
pub struct Server {
    registry: Registry,
    config: EngineConfig,
    access: Arc<dyn AccessPolicy>,
}

impl Server {
    /// Create a server that grants all access.
    pub fn new(registry: Registry, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            access: Arc::new(AllowAll),
        }
    }

    /// Replace the access policy.
    pub fn with_access(mut self, access: impl AccessPolicy + 'static) -> Self {
        self.access = Arc::new(access);
        self
    }

    /// The model registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Look up a model.
    pub fn model(&self, type_name: &str) -> QueryResult<&Arc<ModelDescriptor>> {
        self.registry.model(type_name)
    }

    /// Link prefix without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.server.base_url.trim_end_matches('/')
    }

    /// `{base}/{route}`
    pub fn collection_link(&self, model: &ModelDescriptor) -> String {
        format!("{}/{}", self.base_url(), model.route())
    }

    /// `{base}/{route}/{id}`
    pub fn resource_link(&self, model: &ModelDescriptor, id: &str) -> String {
        format!("{}/{}", self.collection_link(model), id)
    }

    /// `{base}/{route}/{id}/relationships/{key}`
    pub fn relationship_link(&self, model: &ModelDescriptor, id: &str, key: &str) -> String {
        format!("{}/relationships/{}", self.resource_link(model, id), key)
    }

    /// Self link of a resolved instance.
    pub fn instance_link(&self, instance: &Instance) -> String {
        match self.registry.get(instance.type_name()) {
            Some(model) => self.resource_link(model, instance.id()),
            None => format!("{}/{}/{}", self.base_url(), instance.type_name(), instance.id()),
        }
    }

    /// Page size for top-level collections.
    pub fn default_page_size(&self) -> u64 {
        self.config.pagination.default_page_size
    }

    /// Largest accepted `page[size]`.
    pub fn max_page_size(&self) -> u64 {
        self.config.pagination.max_page_size
    }

    /// Page size for to-many relationship values.
    pub fn indirect_page_size(&self) -> u64 {
        self.config.pagination.default_indirect_page_size
    }

    /// Page size for collections of `model`.
    pub fn collection_page_size(&self, model: &ModelDescriptor) -> u64 {
        model.page_size().unwrap_or_else(|| self.default_page_size())
    }

    /// Fail with a forbidden error unless every instance may be returned.
    pub fn check_access(&self, type_name: &str, instances: &[Arc<Instance>]) -> QueryResult<()> {
        if instances.is_empty() || self.access.can_access_all(instances) {
            Ok(())
        } else {
            Err(QueryError::forbidden(type_name))
        }
    }
}
