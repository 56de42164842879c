//! In-memory [`VectorIndex`] implementation for tests and embedding hosts
//! that need no persistence.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Vector search is brute-force
//! cosine similarity over all stored vectors.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::dedup::ProcessedHashSet;
use crate::embedding::{cosine_similarity, embed_one, Embedder};
use crate::error::{Backend, RagError};
use crate::models::{NormalizedDocument, ScoredDocument};

use super::{partition_new, rank_top_k, UpsertReport, VectorIndex};

struct Entry {
    document: NormalizedDocument,
    vector: Vec<f32>,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn held_hashes(&self) -> Result<ProcessedHashSet, RagError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .iter()
            .map(|e| e.document.metadata.content_hash.clone())
            .collect())
    }
}

fn poisoned() -> RagError {
    RagError::Storage("in-memory index lock poisoned".into())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, documents: &[NormalizedDocument]) -> Result<UpsertReport, RagError> {
        let held = self.held_hashes()?;
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

        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let mut stored = 0;
        for (doc, vector) in fresh.into_iter().zip(vectors) {
            let hash = &doc.metadata.content_hash;
            // Another writer may have landed the same hash while we embedded.
            if entries
                .iter()
                .any(|e| &e.document.metadata.content_hash == hash)
            {
                already_present += 1;
                continue;
            }
            entries.push(Entry {
                document: doc.clone(),
                vector,
            });
            stored += 1;
        }

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

        let entries = self.entries.read().map_err(|_| poisoned())?;
        let scored: Vec<ScoredDocument> = entries
            .iter()
            .map(|e| ScoredDocument {
                document: e.document.clone(),
                score: cosine_similarity(&query_vec, &e.vector),
            })
            .collect();
        Ok(rank_top_k(scored, k))
    }

    async fn reset(&self) -> Result<(), RagError> {
        self.entries.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize, RagError> {
        Ok(self.entries.read().map_err(|_| poisoned())?.len())
    }

    async fn content_hashes(&self) -> Result<ProcessedHashSet, RagError> {
        self.held_hashes()
    }
}
