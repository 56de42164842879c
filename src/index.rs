//! SQLite-backed [`VectorIndex`].
//!
//! One file, `dir/index.sqlite`, holds every entry (canonical text, metadata,
//! and its embedding as a little-endian `f32` BLOB) plus an `index_meta`
//! table recording which embedding model and dimensionality built it.
//!
//! Search is brute-force cosine over all stored vectors; facility log
//! volumes stay far below the point where an ANN structure would pay off.
//!
//! # Durability
//!
//! Embeddings for an upsert are computed before the transaction opens, so a
//! backend failure writes nothing. The insert of every entry and the meta
//! rows is then one transaction, committed under `synchronous = FULL`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use facility_rag_core::dedup::ProcessedHashSet;
use facility_rag_core::embedding::{blob_to_vec, cosine_similarity, embed_one, vec_to_blob, Embedder};
use facility_rag_core::models::{DocumentMetadata, NormalizedDocument, ScoredDocument};
use facility_rag_core::store::{partition_new, rank_top_k, UpsertReport, VectorIndex};
use facility_rag_core::{Backend, RagError};
use sqlx::{Row, SqlitePool};

use crate::{db, migrate};

pub const INDEX_FILE: &str = "index.sqlite";

/// Embedder identity recorded in `index_meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEmbedder {
    pub model: String,
    pub dims: Option<usize>,
}

pub struct SqliteIndex {
    pool: SqlitePool,
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl SqliteIndex {
    /// Reopen the index under `dir`, or create an empty one there.
    pub async fn open_or_create(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, RagError> {
        let path = dir.join(INDEX_FILE);
        let existed = path.exists();

        let pool = db::connect(&path)
            .await
            .map_err(|e| RagError::Storage(format!("{:#}", e)))?;
        migrate::run_migrations(&pool)
            .await
            .map_err(|e| RagError::Storage(format!("{:#}", e)))?;

        let index = Self {
            pool,
            path,
            embedder,
        };
        if existed {
            let entries = index.len().await?;
            tracing::info!(path = %index.path.display(), entries, "opened index");
        } else {
            tracing::info!(path = %index.path.display(), "created empty index");
        }
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Model and dims of the embedder that wrote the stored vectors, if any.
    pub async fn stored_embedder(&self) -> Result<Option<StoredEmbedder>, RagError> {
        let rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::storage)?;

        let mut model = None;
        let mut dims = None;
        for row in &rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match key.as_str() {
                "model" => model = Some(value),
                "dims" => {
                    dims = Some(value.parse::<usize>().map_err(|_| {
                        RagError::Consistency(format!("index_meta dims is not a number: {}", value))
                    })?)
                }
                _ => {}
            }
        }
        Ok(model.map(|model| StoredEmbedder { model, dims }))
    }

    /// Earliest and latest stored record timestamps.
    pub async fn timestamp_span(&self) -> Result<Option<(String, String)>, RagError> {
        let row = sqlx::query("SELECT MIN(timestamp) AS first, MAX(timestamp) AS last FROM entries")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;
        let first: Option<String> = row.get("first");
        let last: Option<String> = row.get("last");
        Ok(first.zip(last))
    }

    fn check_dims(&self, stored: Option<usize>, got: usize) -> Result<(), RagError> {
        match stored {
            Some(d) if d != got => Err(RagError::Consistency(format!(
                "index holds {}-dimensional vectors, embedder produced {}",
                d, got
            ))),
            _ => Ok(()),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, documents: &[NormalizedDocument]) -> Result<UpsertReport, RagError> {
        let held = self.content_hashes().await?;
        let (fresh, mut already_present) = partition_new(documents, &held);
        if fresh.is_empty() {
            return Ok(UpsertReport {
                stored: 0,
                already_present,
            });
        }

        let texts: Vec<String> = fresh.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != fresh.len() {
            return Err(RagError::BackendResponse {
                backend: Backend::Embedding,
                message: format!("expected {} vectors, got {}", fresh.len(), vectors.len()),
            });
        }

        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        let stored_meta = self.stored_embedder().await?;
        self.check_dims(stored_meta.as_ref().and_then(|m| m.dims), dims)?;
        self.check_dims(self.embedder.dims(), dims)?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;
        let mut stored = 0;

        for (doc, vector) in fresh.into_iter().zip(&vectors) {
            if vector.len() != dims {
                return Err(RagError::BackendResponse {
                    backend: Backend::Embedding,
                    message: "vectors of mixed dimensionality".into(),
                });
            }
            let result = sqlx::query(
                r#"
                INSERT INTO entries (id, content_hash, content, timestamp, occupancy_count,
                                     embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(content_hash) DO NOTHING
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&doc.metadata.content_hash)
            .bind(&doc.content)
            .bind(&doc.metadata.timestamp)
            .bind(doc.metadata.occupancy_count as i64)
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;

            if result.rows_affected() == 1 {
                stored += 1;
            } else {
                already_present += 1;
            }
        }

        for (key, value) in [
            ("model", self.embedder.model_name().to_string()),
            ("dims", dims.to_string()),
        ] {
            sqlx::query("INSERT OR IGNORE INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(RagError::storage)?;
        }

        tx.commit().await.map_err(RagError::storage)?;

        tracing::info!(stored, already_present, "index upsert committed");
        Ok(UpsertReport {
            stored,
            already_present,
        })
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredDocument>, RagError> {
        if k == 0 || self.is_empty().await? {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.embedder.as_ref(), text).await?;

        let rows = sqlx::query(
            "SELECT content, timestamp, occupancy_count, content_hash, embedding FROM entries ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        let scored: Vec<ScoredDocument> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let count: i64 = row.get("occupancy_count");
                ScoredDocument {
                    score: cosine_similarity(&query_vec, &blob_to_vec(&blob)),
                    document: NormalizedDocument {
                        content: row.get("content"),
                        metadata: DocumentMetadata {
                            timestamp: row.get("timestamp"),
                            occupancy_count: count.max(0) as u64,
                            content_hash: row.get("content_hash"),
                        },
                    },
                }
            })
            .collect();

        Ok(rank_top_k(scored, k))
    }

    async fn reset(&self) -> Result<(), RagError> {
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;
        sqlx::query("DELETE FROM entries")
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;
        tx.commit().await.map_err(RagError::storage)?;

        tracing::info!(path = %self.path.display(), "index reset");
        Ok(())
    }

    async fn len(&self) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(count as usize)
    }

    async fn content_hashes(&self) -> Result<ProcessedHashSet, RagError> {
        let hashes: Vec<String> = sqlx::query_scalar("SELECT content_hash FROM entries")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(hashes.into_iter().collect())
    }

    async fn verify_embedder(&self) -> Result<(), RagError> {
        let Some(stored) = self.stored_embedder().await? else {
            return Ok(());
        };
        if stored.model != self.embedder.model_name() {
            return Err(RagError::Consistency(format!(
                "index was built with embedding model '{}', configured model is '{}'",
                stored.model,
                self.embedder.model_name()
            )));
        }
        if let (Some(stored_dims), Some(dims)) = (stored.dims, self.embedder.dims()) {
            self.check_dims(Some(stored_dims), dims)?;
        }
        Ok(())
    }
}
