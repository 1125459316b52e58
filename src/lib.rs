//! # Weave
//!
//! Object-graph resolution over relational storage.
//!
//! Weave maps declared models onto JSON:API style documents:
//! - Typed attribute and relationship descriptors, declared once at startup
//! - Filtering, ordering and pagination compiled from request parameters
//! - Concurrent relationship resolution with recursive `include` expansion
//! - A per-request cache so each instance is loaded at most once
//! - Create, update and delete inside one transaction per request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use weave::prelude::*;
//! use weave::fields::TextField;
//! use weave::relations::{DirectRelation, ReverseRelation};
//! use weave::sqlite::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::builder()
//!         .model(
//!             ModelDescriptor::builder("authors", "authors")
//!                 .attribute(TextField::new("name"))
//!                 .relationship(ReverseRelation::new("books", "books", "author_id")),
//!         )
//!         .model(
//!             ModelDescriptor::builder("books", "books")
//!                 .attribute(TextField::new("title"))
//!                 .relationship(DirectRelation::new("author", "authors", "author_id")),
//!         )
//!         .build()?;
//!     let server = Arc::new(Server::new(registry, EngineConfig::default()));
//!     let store = SqliteStore::from_url("sqlite://library.db").await?;
//!
//!     let resolver = Resolver::new(Arc::clone(&server), Arc::new(store));
//!     let books = server.model("books")?;
//!     let query = Query::compile(&server, books, &QueryParams::parse("include=author"))?;
//!     let document = resolver.list("books", &query).await?;
//!     println!("{}", document.to_json(&server));
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use weave_query::{
    cache, config, document, error, fields, filter, include, instance, logging, model,
    pagination, params, pointer, query, relation_map, relations, resolver, server, store,
    task_group, types, value,
};

/// SQLite persistence.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use weave_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use weave_query::{
        AccessPolicy, Document, EngineConfig, FieldValue, IncludeTree, Instance, ModelDescriptor,
        PageRequest, Persistence, Query, QueryError, QueryParams, QueryResult, Registry,
        Resolver, Selector, Server, Value,
    };
}

// Re-export key types at the crate root
pub use weave_query::{QueryError, QueryResult};
