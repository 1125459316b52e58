//! SQLite configuration.

use std::path::{Path, PathBuf};

use crate::error::{SqliteError, SqliteResult};

/// SQLite database configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path (or ":memory:" for in-memory).
    pub path: DatabasePath,
    /// Enforce foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Journal mode.
    pub journal_mode: JournalMode,
}

/// Database location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database, private to one store.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    /// Delete the journal after each transaction.
    #[default]
    Delete,
    /// Keep the journal in memory.
    Memory,
    /// Write-ahead logging.
    Wal,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
        }
    }

    fn parse(value: &str) -> SqliteResult<Self> {
        match value.to_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "memory" => Ok(Self::Memory),
            "wal" => Ok(Self::Wal),
            other => Err(SqliteError::config(format!("unknown journal mode {}", other))),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            journal_mode: JournalMode::Delete,
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a SQLite URL.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` or `:memory:`
    /// - `sqlite://path/to/db.sqlite`
    /// - `file:path/to/db.sqlite`
    ///
    /// Options: `foreign_keys`, `busy_timeout`, `journal_mode`.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url = url.as_ref();
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let mut config = match location {
            "sqlite::memory:" | ":memory:" | "sqlite://:memory:" => Self::memory(),
            _ => {
                let path = location
                    .strip_prefix("sqlite://")
                    .or_else(|| location.strip_prefix("sqlite:"))
                    .or_else(|| location.strip_prefix("file:"))
                    .unwrap_or(location);
                if path.is_empty() {
                    return Err(SqliteError::config("database path is required"));
                }
                Self::file(path)
            }
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "mode" if value == "memory" => config.path = DatabasePath::Memory,
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "busy_timeout" => {
                    let ms = value.parse().map_err(|_| {
                        SqliteError::config(format!("busy_timeout must be an integer, got {}", value))
                    })?;
                    config.busy_timeout_ms = Some(ms);
                }
                "journal_mode" => config.journal_mode = JournalMode::parse(value)?,
                other => {
                    return Err(SqliteError::config(format!("unknown option {}", other)));
                }
            }
        }

        Ok(config)
    }

    /// Pragmas run once when the store opens.
    pub fn init_sql(&self) -> String {
        let mut sql = String::new();
        sql.push_str(&format!(
            "PRAGMA foreign_keys = {};\n",
            if self.foreign_keys { "ON" } else { "OFF" }
        ));
        if !self.path.is_memory() {
            sql.push_str(&format!(
                "PRAGMA journal_mode = {};\n",
                self.journal_mode.as_pragma()
            ));
        }
        if let Some(timeout) = self.busy_timeout_ms {
            sql.push_str(&format!("PRAGMA busy_timeout = {};\n", timeout));
        }
        sql
    }

    /// Enable or disable foreign keys.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout in milliseconds.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    /// Set the journal mode.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}
