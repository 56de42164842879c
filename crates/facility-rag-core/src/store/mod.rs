//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines every storage operation the pipeline
//! needs, enabling pluggable backends (SQLite in the application crate,
//! [`memory::InMemoryIndex`] here).
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Embed and append documents whose hash is not yet held |
//! | [`query`](VectorIndex::query) | k nearest documents by cosine similarity |
//! | [`reset`](VectorIndex::reset) | Discard every stored entry |
//! | [`len`](VectorIndex::len) | Number of stored entries |
//! | [`content_hashes`](VectorIndex::content_hashes) | Hashes held in the index's own metadata |
//! | [`verify_embedder`](VectorIndex::verify_embedder) | Reject an index built by another embedder |
//!
//! # Contract
//!
//! - `upsert` is all-or-nothing: embeddings are computed before anything is
//!   written, and the write is a single unit a concurrent reader observes
//!   either entirely or not at all.
//! - `upsert` and `reset` are durable when they return.
//! - `upsert` refuses hashes it already holds, independently of any
//!   deduplication the caller did.
//! - `query` does not deduplicate.

pub mod memory;

use async_trait::async_trait;

use crate::dedup::ProcessedHashSet;
use crate::error::RagError;
use crate::models::{NormalizedDocument, ScoredDocument};

/// What an [`upsert`](VectorIndex::upsert) actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Entries written.
    pub stored: usize,
    /// Documents skipped because the index already held their hash.
    pub already_present: usize,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, documents: &[NormalizedDocument]) -> Result<UpsertReport, RagError>;

    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredDocument>, RagError>;

    async fn reset(&self) -> Result<(), RagError>;

    async fn len(&self) -> Result<usize, RagError>;

    async fn is_empty(&self) -> Result<bool, RagError> {
        Ok(self.len().await? == 0)
    }

    async fn content_hashes(&self) -> Result<ProcessedHashSet, RagError>;

    /// Fail with [`RagError::Consistency`] if the stored vectors were built by
    /// a different embedding model or dimensionality than the current one.
    async fn verify_embedder(&self) -> Result<(), RagError> {
        Ok(())
    }
}

/// Split `documents` into those not yet held (first occurrence only) and a
/// count of the rest.
pub fn partition_new<'a>(
    documents: &'a [NormalizedDocument],
    held: &ProcessedHashSet,
) -> (Vec<&'a NormalizedDocument>, usize) {
    let mut seen = ProcessedHashSet::new();
    let mut fresh = Vec::with_capacity(documents.len());
    let mut skipped = 0;
    for doc in documents {
        let hash = &doc.metadata.content_hash;
        if held.contains(hash) || !seen.insert(hash.clone()) {
            skipped += 1;
        } else {
            fresh.push(doc);
        }
    }
    (fresh, skipped)
}

/// Sort by descending score, keeping insertion order on ties, and keep `k`.
pub fn rank_top_k(mut scored: Vec<ScoredDocument>, k: usize) -> Vec<ScoredDocument> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
