//! Benchmarks for query compilation and SQL rendering.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use weave::fields::{DateField, IntegerField, TextField};
use weave::filter::render_where;
use weave::prelude::*;
use weave::relations::{DirectRelation, ManyToManyRelation, ReverseRelation};

fn server() -> Arc<Server> {
    let registry = Registry::builder()
        .model(
            ModelDescriptor::builder("authors", "authors")
                .attribute(TextField::new("name"))
                .relationship(ReverseRelation::new("books", "books", "author_id")),
        )
        .model(
            ModelDescriptor::builder("books", "books")
                .attribute(TextField::new("title"))
                .attribute(IntegerField::new("pages").nullable())
                .attribute(DateField::new("published").nullable())
                .relationship(DirectRelation::new("author", "authors", "author_id"))
                .relationship(ManyToManyRelation::new(
                    "tags", "tags", "book_tags", "book_id", "tag_id",
                )),
        )
        .model(
            ModelDescriptor::builder("tags", "tags")
                .attribute(TextField::new("name"))
                .relationship(ManyToManyRelation::new(
                    "books", "books", "book_tags", "tag_id", "book_id",
                )),
        )
        .build()
        .expect("bench registry is valid");
    Arc::new(Server::new(registry, EngineConfig::default()))
}

const CASES: [(&str, &str); 4] = [
    ("empty", ""),
    ("attribute", "pages__gt=100&title__contains=dune"),
    ("relationship", "author=a1&tags__contains=t1,t2&tags__count__gt=1"),
    (
        "mixed",
        "pages__gt=100&pages__lt=900&published__after=1960-01-01&title__length__gt=3\
         &author=a1&tags__excludes=t9&sort=-published,title&page[size]=25&include=author,tags",
    ),
];

fn bench_compile(c: &mut Criterion) {
    let server = server();
    let books = Arc::clone(server.model("books").expect("books model"));
    let mut group = c.benchmark_group("query_compile");

    for (name, raw) in CASES {
        let params = QueryParams::parse(raw);
        group.bench_with_input(BenchmarkId::from_parameter(name), &params, |b, params| {
            b.iter(|| Query::compile(&server, &books, black_box(params)))
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let server = server();
    let books = Arc::clone(server.model("books").expect("books model"));
    let mut group = c.benchmark_group("where_render");

    for (name, raw) in CASES {
        let query = Query::compile(&server, &books, &QueryParams::parse(raw)).expect("compiles");
        group.bench_with_input(BenchmarkId::from_parameter(name), &query, |b, query| {
            b.iter(|| {
                let mut args = Vec::new();
                let sql = render_where(black_box(&query.filters), &mut args);
                (sql, args)
            })
        });
    }
    group.finish();
}

fn bench_params(c: &mut Criterion) {
    let raw = CASES[3].1;
    c.bench_function("params_parse", |b| b.iter(|| QueryParams::parse(black_box(raw))));
}

criterion_group!(benches, bench_compile, bench_render, bench_params);
criterion_main!(benches);
