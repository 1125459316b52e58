//! Shared fixtures: a small library schema in in-memory SQLite.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use weave::fields::{DateField, DecimalField, IntegerField, TextField};
use weave::prelude::*;
use weave::relations::{
    DirectRelation, ManyToManyRelation, PolymorphicRelation, PolymorphicReverseRelation,
    ReverseRelation,
};
use weave::sqlite::SqliteStore;
use weave::store::{Row, Transaction};

pub const SCHEMA: &str = r#"
CREATE TABLE authors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    born TEXT
);
CREATE TABLE books (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    pages INTEGER,
    published TEXT,
    price TEXT,
    author_id TEXT REFERENCES authors(id)
);
CREATE TABLE tags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE book_tags (
    book_id TEXT NOT NULL REFERENCES books(id),
    tag_id TEXT NOT NULL REFERENCES tags(id)
);
CREATE TABLE chapters (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    position INTEGER NOT NULL,
    book_id TEXT REFERENCES books(id)
);
CREATE TABLE comments (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    subject_type TEXT,
    subject_id TEXT
);
"#;

pub const SEED: &str = r#"
INSERT INTO authors VALUES
    ('a1', 'Ursula K. Le Guin', '1929-10-21'),
    ('a2', 'Frank Herbert', '1920-10-08'),
    ('a3', 'Anonymous', NULL);
INSERT INTO books VALUES
    ('b1', 'A Wizard of Earthsea', 183, '1968-11-01', '9.99', 'a1'),
    ('b2', 'The Left Hand of Darkness', 286, '1969-03-01', '12.50', 'a1'),
    ('b3', 'Dune', 412, '1965-08-01', '15.00', 'a2'),
    ('b4', 'Untitled Draft', NULL, NULL, NULL, NULL);
INSERT INTO tags VALUES
    ('t1', 'fantasy'), ('t2', 'classic'), ('t3', 'sf'), ('t4', 'award'),
    ('t5', 'series'), ('t6', 'desert'), ('t7', 'ecology');
INSERT INTO book_tags VALUES
    ('b1', 't1'), ('b1', 't2'),
    ('b2', 't3'), ('b2', 't4'),
    ('b3', 't1'), ('b3', 't2'), ('b3', 't3'), ('b3', 't4'),
    ('b3', 't5'), ('b3', 't6'), ('b3', 't7');
INSERT INTO chapters VALUES
    ('c1', 'Book One: Dune', 1, 'b3'),
    ('c2', 'Book Two: Muad''Dib', 2, 'b3'),
    ('c3', 'Book Three: The Prophet', 3, 'b3'),
    ('c4', 'Warriors in the Mist', 1, 'b1');
INSERT INTO comments VALUES
    ('m1', 'Loved it', 'books', 'b3'),
    ('m2', 'Prolific', 'authors', 'a1'),
    ('m3', 'Orphaned', NULL, NULL),
    ('m4', 'Read it twice', 'books', 'b3');
"#;

/// The library models.
pub fn registry() -> Registry {
    Registry::builder()
        .model(
            ModelDescriptor::builder("authors", "authors")
                .attribute(TextField::new("name").min_len(1).max_len(120))
                .attribute(DateField::new("born").nullable())
                .relationship(ReverseRelation::new("books", "books", "author_id"))
                .relationship(PolymorphicReverseRelation::new(
                    "comments",
                    "comments",
                    "subject_type",
                    "subject_id",
                ))
                .order_by("name"),
        )
        .model(
            ModelDescriptor::builder("books", "books")
                .attribute(TextField::new("title").min_len(1).max_len(200))
                .attribute(IntegerField::new("pages").nullable().min(1))
                .attribute(DateField::new("published").nullable())
                .attribute(DecimalField::new("price").nullable())
                .relationship(DirectRelation::new("author", "authors", "author_id"))
                .relationship(ManyToManyRelation::new(
                    "tags",
                    "tags",
                    "book_tags",
                    "book_id",
                    "tag_id",
                ))
                .relationship(ReverseRelation::new("chapters", "chapters", "book_id").with_page_size(2))
                .relationship(PolymorphicReverseRelation::new(
                    "comments",
                    "comments",
                    "subject_type",
                    "subject_id",
                ))
                .order_by("title"),
        )
        .model(
            ModelDescriptor::builder("tags", "tags")
                .attribute(TextField::new("name"))
                .relationship(ManyToManyRelation::new(
                    "books",
                    "books",
                    "book_tags",
                    "tag_id",
                    "book_id",
                ))
                .order_by("name"),
        )
        .model(
            ModelDescriptor::builder("chapters", "chapters")
                .attribute(TextField::new("title"))
                .attribute(IntegerField::new("position"))
                .relationship(DirectRelation::new("book", "books", "book_id"))
                .order_by("position"),
        )
        .model(
            ModelDescriptor::builder("comments", "comments")
                .attribute(TextField::new("body"))
                .relationship(
                    PolymorphicRelation::new("subject", "subject_type", "subject_id")
                        .restrict_to(["books", "authors"]),
                ),
        )
        .build()
        .expect("library registry is valid")
}

/// Wraps a store and records every read issued outside a transaction.
pub struct CountingStore {
    inner: Arc<dyn Persistence>,
    queries: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn Persistence>) -> Self {
        Self {
            inner,
            queries: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn reset(&self) {
        self.queries.store(0, Ordering::SeqCst);
        self.log.lock().clear();
    }
}

#[async_trait]
impl Persistence for CountingStore {
    async fn query(&self, sql: &str, args: &[Value]) -> QueryResult<Vec<Row>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(sql.to_string());
        self.inner.query(sql, args).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> QueryResult<u64> {
        self.inner.exec(sql, args).await
    }

    async fn begin(&self) -> QueryResult<Box<dyn Transaction>> {
        self.inner.begin().await
    }
}

pub struct Fixture {
    pub server: Arc<Server>,
    pub store: Arc<CountingStore>,
    pub sqlite: SqliteStore,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let sqlite = SqliteStore::memory().await.expect("open in-memory database");
        sqlite.execute_batch(SCHEMA).await.expect("create schema");
        sqlite.execute_batch(SEED).await.expect("seed data");
        let store = Arc::new(CountingStore::new(Arc::new(sqlite.clone())));
        Self {
            server: Arc::new(Server::new(registry(), config)),
            store,
            sqlite,
        }
    }

    /// A resolver with an empty request cache.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(Arc::clone(&self.server), self.store.clone())
    }

    pub fn query(&self, type_name: &str, params: &str) -> QueryResult<Query> {
        let model = self.server.model(type_name)?;
        Query::compile(&self.server, model, &QueryParams::parse(params))
    }
}

/// `(type, id)` pairs of a list of instances.
pub fn keys(instances: &[Arc<Instance>]) -> Vec<(String, String)> {
    instances
        .iter()
        .map(|i| (i.type_name().to_string(), i.id().to_string()))
        .collect()
}

/// Ids on a to-many page.
pub fn page_ids(instance: &Instance, key: &str) -> Vec<String> {
    instance
        .page(key)
        .map(|p| p.data.iter().map(|r| r.id.clone()).collect())
        .unwrap_or_default()
}

/// Ids of a document's primary data.
pub fn primary_ids(document: &Document) -> Vec<String> {
    document
        .data
        .instances()
        .iter()
        .map(|i| i.id().to_string())
        .collect()
}
