//! # weave-query
//!
//! Object-graph resolution over relational storage.
//!
//! This crate provides the core of Weave:
//! - Attribute and relationship descriptors ([`fields`], [`relations`])
//! - A model registry built once at startup ([`model`])
//! - A compiler from request parameters to SQL filters ([`query`], [`filter`])
//! - The concurrent resolution engine with its request cache ([`resolver`], [`cache`])
//! - Pagination links and response documents ([`pagination`], [`document`])
//! - The write path ([`writer`])
//!
//! Storage is reached only through the [`Persistence`] trait; see the
//! `weave-sqlite` crate for an implementation.
//!
//! ## Declaring models
//!
//! ```rust
//! use weave_query::fields::{IntegerField, TextField};
//! use weave_query::relations::{DirectRelation, ReverseRelation};
//! use weave_query::{ModelDescriptor, Registry};
//!
//! let registry = Registry::builder()
//!     .model(
//!         ModelDescriptor::builder("authors", "authors")
//!             .attribute(TextField::new("name").max_len(120))
//!             .relationship(ReverseRelation::new("books", "books", "author_id")),
//!     )
//!     .model(
//!         ModelDescriptor::builder("books", "books")
//!             .attribute(TextField::new("title"))
//!             .attribute(IntegerField::new("pages").nullable().min(1))
//!             .relationship(DirectRelation::new("author", "authors", "author_id"))
//!             .order_by("title"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(registry.type_names(), vec!["authors", "books"]);
//! ```
//!
//! ## Compiling a request
//!
//! ```rust
//! use weave_query::fields::IntegerField;
//! use weave_query::{EngineConfig, ModelDescriptor, Query, QueryParams, Registry, Server};
//!
//! let registry = Registry::builder()
//!     .model(ModelDescriptor::builder("books", "books").attribute(IntegerField::new("pages").nullable()))
//!     .build()
//!     .unwrap();
//! let server = Server::new(registry, EngineConfig::default());
//! let books = server.model("books").unwrap();
//!
//! let params = QueryParams::parse("pages__gt=100&page[size]=20");
//! let query = Query::compile(&server, books, &params).unwrap();
//! let (sql, _args) = query.where_sql();
//! assert_eq!(sql, r#""books"."pages" > $1"#);
//! assert_eq!(query.page.size, 20);
//!
//! // Conflicting filters fail before any I/O.
//! let params = QueryParams::parse("pages=1&pages__is_null=true");
//! assert!(Query::compile(&server, books, &params).is_err());
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod fields;
pub mod filter;
pub mod include;
pub mod instance;
#[macro_use]
pub mod logging;
pub mod model;
pub mod pagination;
pub mod params;
pub mod pointer;
pub mod query;
pub mod relation_map;
pub mod relations;
pub mod resolver;
pub mod server;
pub mod store;
pub mod task_group;
pub mod types;
pub mod value;
mod writer;

pub use cache::{CacheEntry, CacheStats, RequestCache};
pub use config::EngineConfig;
pub use document::{Document, PrimaryData};
pub use error::{ErrorCategory, ErrorCode, ErrorContext, QueryError, QueryResult};
pub use fields::Attribute;
pub use filter::Filter;
pub use include::IncludeTree;
pub use instance::{FieldValue, Instance};
pub use model::{ModelBuilder, ModelDescriptor, Registry, RegistryBuilder};
pub use pagination::{PageLinks, PageMeta, PageRequest};
pub use params::QueryParams;
pub use pointer::{Page, Pointer, ResourceIdentifier};
pub use query::{Query, Selector};
pub use relations::{RelationKind, Relationship};
pub use resolver::{Resolution, Resolver};
pub use server::{AccessPolicy, AllowAll, Server};
pub use store::{Persistence, Row, Statement, Transaction};
pub use types::{OrderBy, OrderByField, SortOrder};
pub use value::{Input, Value};
