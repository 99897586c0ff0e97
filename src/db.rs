use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::{RagError, Result};

/// Open a SQLite pool for a `sqlite:<path>` URL, creating the file and its
/// parent directory if needed.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| RagError::Config(format!("not a sqlite URL: {}", url)))?;
    let in_memory = path == ":memory:" || path.is_empty();

    if !in_memory {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RagError::store("sqlite", e))?;
            }
        }
    }

    let mut options = SqliteConnectOptions::from_str(url)
        .map_err(|e| RagError::store("sqlite", e))?
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    // Each in-memory connection is its own database
    let max_connections = if in_memory { 1 } else { 5 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| RagError::store("sqlite", e))
}
