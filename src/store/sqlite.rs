//! SQLite-backed vector store.
//!
//! Embeddings are stored as `[x,y,...]` text literals in the
//! `document_chunks` table, and nearest-neighbor search is a full scan
//! ranked in Rust. That is plenty for a desk-sized corpus (tens of
//! thousands of chunks) and needs no extension.
//!
//! Each [`insert_batch`](VectorStore::insert_batch) runs in one
//! transaction: every stored chunk of the touched documents is deleted and
//! the batch is upserted on `(doc_id, chunk_index)`.

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{
    batch_doc_ids, check_query_dims, rank_by_distance, validate_batch, StoreInfo, VectorStore,
};
use crate::db;
use crate::embedding::{parse_vector_literal, to_vector_literal};
use crate::error::{RagError, Result};
use crate::migrate;
use crate::models::{DocumentChunk, RetrievedChunk};

fn db_err(e: sqlx::Error) -> RagError {
    RagError::store("sqlite", e)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = db::connect(url).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn meta<'e, E>(executor: E, key: &str) -> Result<Option<String>>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar("SELECT value FROM store_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(executor)
            .await
            .map_err(db_err)
    }

    async fn stored_dims<'e, E>(executor: E) -> Result<Option<usize>>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        match Self::meta(executor, "dims").await? {
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|e| RagError::store("sqlite", format!("corrupt dims in store_meta: {}", e))),
            None => Ok(None),
        }
    }

    async fn set_meta(tx: &mut Transaction<'_, Sqlite>, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO store_meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn register_model(&self, model: &str, dims: usize) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some(existing) = Self::stored_dims(&mut *tx).await? {
            if existing != dims {
                return Err(RagError::DimensionMismatch {
                    expected: existing,
                    actual: dims,
                });
            }
        }
        if let Some(existing) = Self::meta(&mut *tx, "model").await? {
            if existing != model {
                return Err(RagError::Config(format!(
                    "store was built with model '{}', not '{}'; run `localmind clear` to switch models",
                    existing, model
                )));
            }
        }

        Self::set_meta(&mut tx, "model", model).await?;
        Self::set_meta(&mut tx, "dims", &dims.to_string()).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn insert_batch(&self, records: &[DocumentChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let store_dims = Self::stored_dims(&mut *tx).await?;
        let Some(dims) = validate_batch(records, store_dims)? else {
            return Ok(());
        };
        if store_dims.is_none() {
            Self::set_meta(&mut tx, "dims", &dims.to_string()).await?;
        }

        for doc_id in batch_doc_ids(records) {
            sqlx::query("DELETE FROM document_chunks WHERE doc_id = ?")
                .bind(doc_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        let now = chrono::Utc::now().timestamp();
        for r in records {
            sqlx::query(
                r#"
                INSERT INTO document_chunks (doc_id, chunk_index, content, embedding, ingested_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(doc_id, chunk_index) DO UPDATE SET
                    content = excluded.content,
                    embedding = excluded.embedding,
                    ingested_at = excluded.ingested_at
                "#,
            )
            .bind(&r.doc_id)
            .bind(r.chunk_index)
            .bind(&r.content)
            .bind(to_vector_literal(&r.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        check_query_dims(Self::stored_dims(&self.pool).await?, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT doc_id, chunk_index, content, embedding FROM document_chunks")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let doc_id: String = row.get("doc_id");
            let chunk_index: i64 = row.get("chunk_index");
            let content: String = row.get("content");
            let literal: String = row.get("embedding");
            let embedding = parse_vector_literal(&literal).map_err(|e| {
                RagError::store(
                    "sqlite",
                    format!("corrupt embedding for {} chunk {}: {}", doc_id, chunk_index, e),
                )
            })?;
            candidates.push((doc_id, chunk_index, content, embedding));
        }

        Ok(rank_by_distance(vector, candidates, k))
    }

    async fn info(&self) -> Result<StoreInfo> {
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT doc_id) FROM document_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(StoreInfo {
            backend: "sqlite".to_string(),
            model: Self::meta(&self.pool, "model").await?,
            dims: Self::stored_dims(&self.pool).await?,
            chunks: chunks as u64,
            documents: documents as u64,
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM document_chunks")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM store_meta")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
