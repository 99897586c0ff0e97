use sqlx::SqlitePool;

use crate::error::{RagError, Result};

/// Create the SQLite schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per chunk; `embedding` holds the `[x,y,...]` literal
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_chunks (
            doc_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding TEXT NOT NULL,
            ingested_at INTEGER NOT NULL,
            PRIMARY KEY (doc_id, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RagError::store("sqlite", e))?;

    // `dims` and `model` keys, written once by the first bind or insert
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS store_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RagError::store("sqlite", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["document_chunks", "store_meta"]);
    }

    #[tokio::test]
    async fn test_chunk_table_columns() {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('document_chunks') ORDER BY cid")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            columns,
            vec!["doc_id", "chunk_index", "content", "embedding", "ingested_at"]
        );
    }
}
