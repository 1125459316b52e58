//! SQLite persistence for the Weave resolution engine.
//!
//! This crate implements [`weave_query::Persistence`] on top of
//! `tokio-rusqlite`, so the engine can be run against an in-memory or
//! file-based SQLite database.
//!
//! # Example
//!
//! ```rust,no_run
//! use weave_query::Persistence;
//! use weave_sqlite::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::from_url("sqlite::memory:").await?;
//!     store
//!         .execute_batch("CREATE TABLE tags (id TEXT PRIMARY KEY, name TEXT NOT NULL);")
//!         .await?;
//!     let rows = store.query(r#"SELECT "id" FROM "tags""#, &[]).await?;
//!     assert!(rows.is_empty());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use error::{SqliteError, SqliteResult};
pub use store::{SqliteStore, SqliteTransaction};
