//! Fuzz target for query compilation.
//!
//! Arbitrary query strings are compiled against a small fixed registry. The
//! compiler must return an error for bad input, never panic, and every
//! compiled query must render a WHERE clause whose placeholders match its
//! arguments.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_query_params
//! ```

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use weave_query::fields::{DateField, IntegerField, TextField};
use weave_query::relations::{DirectRelation, ManyToManyRelation, PolymorphicRelation};
use weave_query::{EngineConfig, ModelDescriptor, Query, QueryParams, Registry, Server};

fn server() -> &'static Server {
    static SERVER: OnceLock<Server> = OnceLock::new();
    SERVER.get_or_init(|| {
        let registry = Registry::builder()
            .model(ModelDescriptor::builder("authors", "authors").attribute(TextField::new("name")))
            .model(
                ModelDescriptor::builder("books", "books")
                    .attribute(TextField::new("title").max_len(200))
                    .attribute(IntegerField::new("pages").nullable())
                    .attribute(DateField::new("published").nullable())
                    .relationship(DirectRelation::new("author", "authors", "author_id"))
                    .relationship(ManyToManyRelation::new(
                        "tags", "tags", "book_tags", "book_id", "tag_id",
                    ))
                    .relationship(PolymorphicRelation::new("subject", "subject_type", "subject_id")),
            )
            .model(ModelDescriptor::builder("tags", "tags").attribute(TextField::new("name")))
            .build()
            .expect("fuzz registry is valid");
        Server::new(registry, EngineConfig::default())
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let server = server();
        let Ok(books) = server.model("books") else {
            return;
        };
        if let Ok(query) = Query::compile(server, books, &QueryParams::parse(input)) {
            let (sql, args) = query.where_sql();
            for n in 1..=args.len() {
                assert!(sql.contains(&format!("${}", n)), "missing ${} in {}", n, sql);
            }
        }
    }
});
