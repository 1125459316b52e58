//! Configuration files and database URLs.

mod common;

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use weave::error::ErrorCode;
use weave::prelude::*;
use weave::sqlite::{DatabasePath, JournalMode, SqliteConfig, SqliteStore};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_config_from_file() {
    let file = write_config(
        r#"
        [server]
        base_url = "https://library.example/api"

        [pagination]
        default_page_size = 20
        max_page_size = 50
        default_indirect_page_size = 3

        [resolver]
        max_concurrency = 4
    "#,
    );

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.server.base_url, "https://library.example/api");
    assert_eq!(config.pagination.default_page_size, 20);
    assert_eq!(config.pagination.max_page_size, 50);
    assert_eq!(config.pagination.default_indirect_page_size, 3);
    assert_eq!(config.resolver.max_concurrency, 4);
}

#[test]
fn test_missing_sections_use_defaults() {
    let file = write_config("[resolver]\nmax_concurrency = 2\n");
    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.pagination, EngineConfig::default().pagination);
    assert_eq!(config.server.base_url, "");
}

#[test]
fn test_invalid_config_is_rejected() {
    let cases = [
        "[pagination]\ndefault_page_size = 0\n",
        "[pagination]\ndefault_page_size = 200\nmax_page_size = 100\n",
        "[resolver]\nmax_concurrency = 0\n",
        "[server]\nbase = \"typo\"\n",
        "not toml at all",
    ];
    for content in cases {
        let file = write_config(content);
        let err = EngineConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration, "{}", content);
    }

    let err = EngineConfig::from_file("/nonexistent/weave.toml").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidConfiguration);
}

#[tokio::test]
async fn test_configured_sizes_shape_documents() {
    let file = write_config(
        r#"
        [server]
        base_url = "https://library.example"

        [pagination]
        default_page_size = 3
        default_indirect_page_size = 2
    "#,
    );
    let config = EngineConfig::from_file(file.path()).unwrap();
    let fx = common::Fixture::with_config(config).await;

    let query = fx.query("books", "").unwrap();
    let doc = fx.resolver().list("books", &query).await.unwrap();
    assert_eq!(common::primary_ids(&doc), vec!["b1", "b3", "b2"]);
    assert_eq!(
        doc.links.as_ref().unwrap().next.as_deref(),
        Some("https://library.example/books?page[offset]=2")
    );

    let b3 = doc.data.instances()[1].clone();
    assert_eq!(common::page_ids(&b3, "tags"), vec!["t4", "t2"]);
    assert_eq!(
        b3.page("tags").unwrap().links.last,
        "https://library.example/books/b3/relationships/tags?page[offset]=4"
    );

    let err = fx.query("books", "page[size]=101").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPagination);
}

#[test]
fn test_sqlite_urls() {
    let config = SqliteConfig::from_url("sqlite::memory:").unwrap();
    assert_eq!(config.path, DatabasePath::Memory);

    let config =
        SqliteConfig::from_url("sqlite://data/library.db?journal_mode=wal&busy_timeout=250")
            .unwrap();
    assert_eq!(config.path, DatabasePath::File("data/library.db".into()));
    assert_eq!(config.journal_mode, JournalMode::Wal);
    assert_eq!(config.busy_timeout_ms, Some(250));

    assert!(SqliteConfig::from_url("sqlite://").is_err());
    assert!(SqliteConfig::from_url("sqlite://x.db?cache=shared").is_err());
}

#[tokio::test]
async fn test_file_database_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("library.db").display());

    let store = SqliteStore::from_url(&url).await.unwrap();
    store.execute_batch(common::SCHEMA).await.unwrap();
    store.execute_batch(common::SEED).await.unwrap();
    drop(store);

    let store = SqliteStore::from_url(&url).await.unwrap();
    let server = Arc::new(Server::new(common::registry(), EngineConfig::default()));
    let resolver = Resolver::new(server, Arc::new(store));
    let doc = resolver
        .find("authors", "a2", &IncludeTree::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        doc.primary().unwrap().attribute("name"),
        Some(&Value::from("Frank Herbert"))
    );
}
