//! [`Persistence`] over a single `tokio-rusqlite` connection.
//!
//! All statements run on the connection's background thread in submission
//! order. A transaction holds the store's lock from `BEGIN` until it is
//! committed or rolled back, so statements from other callers wait instead of
//! landing inside it.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params_from_iter;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_rusqlite::Connection;
use tracing::{debug, instrument, warn};
use weave_query::{Persistence, QueryResult, Row, Transaction, Value};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types::{from_sqlite, rewrite_placeholders, to_sqlite};

/// SQLite storage for the resolution engine.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
    lock: Arc<Mutex<()>>,
    config: SqliteConfig,
}

impl SqliteStore {
    /// Open a database and apply the configured pragmas.
    #[instrument(skip_all, fields(path = ?config.path))]
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };
        let init_sql = config.init_sql();
        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;
        debug!("Opened SQLite store");

        Ok(Self {
            conn,
            lock: Arc::new(Mutex::new(())),
            config,
        })
    }

    /// Open a private in-memory database.
    pub async fn memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// Open the database named by a URL; see [`SqliteConfig::from_url`].
    pub async fn from_url(url: &str) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run a batch of `;`-separated statements, typically a schema.
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        let _guard = self.lock.lock().await;
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

async fn run_query(conn: &Connection, sql: &str, args: &[Value]) -> SqliteResult<Vec<Row>> {
    let sql = rewrite_placeholders(sql);
    let args: Vec<_> = args.iter().map(to_sqlite).collect();
    debug!(sql = %sql, args = args.len(), "Executing query");

    let rows = conn
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let width = stmt.column_count();
            let rows = stmt
                .query_map(params_from_iter(args.iter()), |row| {
                    (0..width)
                        .map(|i| row.get_ref(i).map(from_sqlite))
                        .collect::<rusqlite::Result<Vec<_>>>()
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?;
    Ok(rows.into_iter().map(Row::new).collect())
}

async fn run_exec(conn: &Connection, sql: &str, args: &[Value]) -> SqliteResult<u64> {
    let sql = rewrite_placeholders(sql);
    let args: Vec<_> = args.iter().map(to_sqlite).collect();
    debug!(sql = %sql, args = args.len(), "Executing statement");

    let changed = conn
        .call(move |conn| Ok(conn.execute(&sql, params_from_iter(args.iter()))?))
        .await?;
    Ok(changed as u64)
}

async fn run_batch(conn: &Connection, sql: &'static str) -> SqliteResult<()> {
    conn.call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
    })
    .await?;
    Ok(())
}

#[async_trait]
impl Persistence for SqliteStore {
    async fn query(&self, sql: &str, args: &[Value]) -> QueryResult<Vec<Row>> {
        let _guard = self.lock.lock().await;
        Ok(run_query(&self.conn, sql, args).await?)
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> QueryResult<u64> {
        let _guard = self.lock.lock().await;
        Ok(run_exec(&self.conn, sql, args).await?)
    }

    async fn begin(&self) -> QueryResult<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        run_batch(&self.conn, "BEGIN IMMEDIATE").await?;
        debug!("Transaction started");
        Ok(Box::new(SqliteTransaction {
            conn: self.conn.clone(),
            guard: Some(guard),
        }))
    }
}

/// An open transaction holding the store lock.
pub struct SqliteTransaction {
    conn: Connection,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SqliteTransaction {
    async fn finish(mut self: Box<Self>, sql: &'static str) -> SqliteResult<()> {
        let guard = self
            .guard
            .take()
            .ok_or_else(|| SqliteError::transaction("transaction already finished"))?;
        let result = run_batch(&self.conn, sql).await;
        drop(guard);
        debug!(statement = sql, ok = result.is_ok(), "Transaction finished");
        result
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn query(&mut self, sql: &str, args: &[Value]) -> QueryResult<Vec<Row>> {
        Ok(run_query(&self.conn, sql, args).await?)
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> QueryResult<u64> {
        Ok(run_exec(&self.conn, sql, args).await?)
    }

    async fn commit(self: Box<Self>) -> QueryResult<()> {
        Ok(self.finish("COMMIT").await?)
    }

    async fn rollback(self: Box<Self>) -> QueryResult<()> {
        Ok(self.finish("ROLLBACK").await?)
    }
}

impl Drop for SqliteTransaction {
    /// An abandoned transaction is rolled back before the lock is released.
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let conn = self.conn.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = run_batch(&conn, "ROLLBACK").await {
                        warn!(error = %e, "Rollback of abandoned transaction failed");
                    }
                    drop(guard);
                });
            }
            Err(_) => warn!("Transaction dropped outside a runtime; left open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        let store = SqliteStore::memory().await.unwrap();
        store
            .execute_batch(
                "CREATE TABLE items (id TEXT PRIMARY KEY, name TEXT NOT NULL, qty INTEGER);",
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_query_and_exec() {
        let store = store().await;
        let changed = store
            .exec(
                r#"INSERT INTO "items" ("id", "name", "qty") VALUES ($1, $2, $3)"#,
                &[Value::from("a"), Value::from("apple"), Value::Int(3)],
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        // Placeholders out of textual order still bind by number.
        let rows = store
            .query(
                r#"SELECT "name", "qty" FROM "items" WHERE "qty" > $2 AND "id" = $1"#,
                &[Value::from("a"), Value::Int(1)],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value(0).unwrap(), &Value::from("apple"));
        assert_eq!(rows[0].value(1).unwrap(), &Value::Int(3));
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.exec(
            r#"INSERT INTO "items" ("id", "name") VALUES ($1, $2)"#,
            &[Value::from("b"), Value::from("bread")],
        )
        .await
        .unwrap();
        assert_eq!(
            tx.query(r#"SELECT "id" FROM "items""#, &[]).await.unwrap().len(),
            1
        );
        tx.rollback().await.unwrap();

        let rows = store.query(r#"SELECT "id" FROM "items""#, &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_commit_persists_changes() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.exec(
            r#"INSERT INTO "items" ("id", "name") VALUES ($1, $2)"#,
            &[Value::from("c"), Value::from("cheese")],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let row = store
            .query_row(r#"SELECT "qty" FROM "items" WHERE "id" = $1"#, &[Value::from("c")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.value(0).unwrap(), &Value::Null);
    }

    #[tokio::test]
    async fn test_storage_errors_convert() {
        let store = store().await;
        let err = store.query("SELECT * FROM missing", &[]).await.unwrap_err();
        assert!(err.is_storage());
    }
}
