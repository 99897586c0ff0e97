//! PostgreSQL + pgvector store backend.
//!
//! Records live in `vector_desk.document_chunks` with a `vector(D)` column,
//! where `D` is fixed by the first model bind or insert (the table is
//! created then). Ranking uses pgvector's `<->` Euclidean operator.
//!
//! Enabled with the `pgvector` feature; the database needs the `vector`
//! extension available.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use super::{batch_doc_ids, check_query_dims, validate_batch, StoreInfo, VectorStore};
use crate::embedding::to_vector_literal;
use crate::error::{RagError, Result};
use crate::models::{DocumentChunk, RetrievedChunk};

pub struct PgVectorStore {
    pool: PgPool,
}

fn db_err(e: sqlx::Error) -> RagError {
    RagError::store("pgvector", e)
}

impl PgVectorStore {
    /// Connect and create the schema and metadata table.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(db_err)?;

        for stmt in [
            "CREATE EXTENSION IF NOT EXISTS vector",
            "CREATE SCHEMA IF NOT EXISTS vector_desk",
            "CREATE TABLE IF NOT EXISTS vector_desk.store_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        ] {
            sqlx::query(stmt).execute(&pool).await.map_err(db_err)?;
        }

        Ok(Self { pool })
    }

    async fn meta<'e, E>(executor: E, key: &str) -> Result<Option<String>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar("SELECT value FROM vector_desk.store_meta WHERE key = $1")
            .bind(key)
            .fetch_optional(executor)
            .await
            .map_err(db_err)
    }

    async fn stored_dims<'e, E>(executor: E) -> Result<Option<usize>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        match Self::meta(executor, "dims").await? {
            Some(v) => v.parse::<usize>().map(Some).map_err(|e| {
                RagError::store("pgvector", format!("corrupt dims in store_meta: {}", e))
            }),
            None => Ok(None),
        }
    }

    async fn set_meta(tx: &mut Transaction<'_, Postgres>, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO vector_desk.store_meta (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Fix the dimension and create the chunk table for it.
    async fn bind_dims(tx: &mut Transaction<'_, Postgres>, dims: usize) -> Result<()> {
        // DDL cannot take bind parameters; `dims` is a usize so this is safe
        let create = format!(
            "CREATE TABLE IF NOT EXISTS vector_desk.document_chunks (\
                doc_id TEXT NOT NULL, \
                chunk_index BIGINT NOT NULL, \
                content TEXT NOT NULL, \
                embedding vector({dims}) NOT NULL, \
                ingested_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
                PRIMARY KEY (doc_id, chunk_index)\
            )"
        );
        sqlx::query(&create).execute(&mut **tx).await.map_err(db_err)?;
        Self::set_meta(tx, "dims", &dims.to_string()).await?;
        debug!(dims, "created vector_desk.document_chunks");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn backend(&self) -> &str {
        "pgvector"
    }

    async fn register_model(&self, model: &str, dims: usize) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        match Self::stored_dims(&mut *tx).await? {
            Some(existing) if existing != dims => {
                return Err(RagError::DimensionMismatch {
                    expected: existing,
                    actual: dims,
                })
            }
            Some(_) => {}
            None => Self::bind_dims(&mut tx, dims).await?,
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
            Self::bind_dims(&mut tx, dims).await?;
        }

        for doc_id in batch_doc_ids(records) {
            sqlx::query("DELETE FROM vector_desk.document_chunks WHERE doc_id = $1")
                .bind(doc_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        for r in records {
            sqlx::query(
                "INSERT INTO vector_desk.document_chunks (doc_id, chunk_index, content, embedding) \
                 VALUES ($1, $2, $3, $4::vector) \
                 ON CONFLICT (doc_id, chunk_index) DO UPDATE SET \
                    content = EXCLUDED.content, \
                    embedding = EXCLUDED.embedding, \
                    ingested_at = now()",
            )
            .bind(&r.doc_id)
            .bind(r.chunk_index)
            .bind(&r.content)
            .bind(to_vector_literal(&r.embedding))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(count = records.len(), "upserted chunks to pgvector");
        Ok(())
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let store_dims = Self::stored_dims(&self.pool).await?;
        check_query_dims(store_dims, vector)?;
        // No dims means the chunk table was never created
        if k == 0 || store_dims.is_none() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT doc_id, chunk_index, content, \
                    (embedding <-> $1::vector)::real AS distance \
             FROM vector_desk.document_chunks \
             ORDER BY embedding <-> $1::vector, doc_id, chunk_index \
             LIMIT $2",
        )
        .bind(to_vector_literal(vector))
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| RetrievedChunk {
                doc_id: row.get("doc_id"),
                chunk_index: row.get("chunk_index"),
                content: row.get("content"),
                distance: row.get("distance"),
            })
            .collect())
    }

    async fn info(&self) -> Result<StoreInfo> {
        let dims = Self::stored_dims(&self.pool).await?;
        let (chunks, documents) = if dims.is_some() {
            let row = sqlx::query(
                "SELECT COUNT(*) AS chunks, COUNT(DISTINCT doc_id) AS documents \
                 FROM vector_desk.document_chunks",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            (row.get::<i64, _>("chunks"), row.get::<i64, _>("documents"))
        } else {
            (0, 0)
        };

        Ok(StoreInfo {
            backend: "pgvector".to_string(),
            model: Self::meta(&self.pool, "model").await?,
            dims,
            chunks: chunks as u64,
            documents: documents as u64,
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DROP TABLE IF EXISTS vector_desk.document_chunks")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM vector_desk.store_meta")
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
