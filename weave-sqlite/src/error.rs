//! Error types for SQLite operations.

use thiserror::Error;
use weave_query::error::QueryError;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
    /// A column held a value with no engine counterpart.
    #[error("Type conversion error: {0}")]
    TypeConversion(String),
    /// Transaction misuse or failure.
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// Create a transaction error.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for QueryError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Sqlite(e) => QueryError::database(e.to_string()).with_source(e),
            SqliteError::Config(msg) => QueryError::configuration(msg),
            SqliteError::TypeConversion(msg) => QueryError::database(format!("type: {}", msg)),
            SqliteError::Transaction(msg) => QueryError::transaction(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqliteError::config("invalid path");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("invalid path"));
    }

    #[test]
    fn test_error_conversion() {
        let err: QueryError = SqliteError::from(rusqlite::Error::QueryReturnedNoRows).into();
        assert!(err.is_storage());
        assert!(err.source.is_some());

        let err: QueryError = SqliteError::transaction("already finished").into();
        assert!(err.is_storage());

        let err: QueryError = SqliteError::config("bad url").into();
        assert_eq!(err.code, weave_query::ErrorCode::InvalidConfiguration);
    }
}
