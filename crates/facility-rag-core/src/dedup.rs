//! Content-hash deduplication of normalized records.
//!
//! Every normalized record gets a SHA-256 digest over its dedup fields in
//! canonical order (see [`DEDUP_FIELDS`](crate::normalize::DEDUP_FIELDS)).
//! [`filter_new`] drops records already seen, in two phases:
//!
//! 1. **Batch-internal**: a record identical to an earlier one in the same
//!    batch is dropped.
//! 2. **Cross-batch**: a record whose hash is in the [`ProcessedHashSet`]
//!    loaded from disk is dropped.
//!
//! Both outcomes are routine (overlapping export windows, re-runs) and are
//! counted and logged, never reported as errors.
//!
//! The set's on-disk form is one hash per line; [`ProcessedHashSet::parse_lines`]
//! and [`ProcessedHashSet::to_lines`] handle it. File I/O lives in the
//! application crate.

use std::collections::{BTreeSet, HashSet};

use sha2::{Digest, Sha256};

use crate::error::RagError;
use crate::models::{CanonicalFields, DocumentMetadata, NormalizedDocument, NormalizedRecord};

/// Compute the content hash of a record's canonical dedup fields.
///
/// Each field contributes `name=value\n`, so adjacent values can never run
/// together (`1` + `23` vs `12` + `3`).
pub fn content_hash(fields: &CanonicalFields) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in fields.iter() {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// True for a lowercase 64-character hex string.
pub fn is_content_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Every content hash ever committed to the vector index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedHashSet {
    hashes: BTreeSet<String>,
}

impl ProcessedHashSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Returns `true` if the hash was not already present.
    pub fn insert(&mut self, hash: impl Into<String>) -> bool {
        self.hashes.insert(hash.into())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hashes.iter().map(String::as_str)
    }

    /// Hashes present here but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a ProcessedHashSet) -> impl Iterator<Item = &'a str> {
        self.hashes.difference(&other.hashes).map(String::as_str)
    }

    pub fn extend(&mut self, other: &ProcessedHashSet) {
        self.hashes.extend(other.hashes.iter().cloned());
    }

    /// Parse the one-hash-per-line file format.
    ///
    /// Blank lines are ignored. Any other line that is not a content hash
    /// makes the whole file corrupt.
    pub fn parse_lines(text: &str) -> Result<Self, RagError> {
        let mut set = Self::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !is_content_hash(line) {
                return Err(RagError::Consistency(format!(
                    "processed-hash file line {} is not a content hash",
                    i + 1
                )));
            }
            set.insert(line);
        }
        Ok(set)
    }

    /// Serialize in sorted order, one hash per line, trailing newline.
    pub fn to_lines(&self) -> String {
        let mut out = String::with_capacity(self.hashes.len() * 65);
        for h in &self.hashes {
            out.push_str(h);
            out.push('\n');
        }
        out
    }
}

impl FromIterator<String> for ProcessedHashSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            hashes: iter.into_iter().collect(),
        }
    }
}

/// Outcome of [`filter_new`].
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Genuinely new documents, in source order.
    pub new_documents: Vec<NormalizedDocument>,
    /// The input set plus the hashes of `new_documents`.
    pub hashes: ProcessedHashSet,
    /// Rows identical to an earlier row of the same batch.
    pub batch_duplicates: usize,
    /// Rows already present in the processed set.
    pub known_duplicates: usize,
}

/// Reduce a normalized batch to the records not yet ingested.
///
/// The returned hash set is only a proposal: the caller persists it after
/// the index has committed `new_documents`.
pub fn filter_new(records: Vec<NormalizedRecord>, processed: &ProcessedHashSet) -> FilterOutcome {
    let mut seen_in_batch: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    let mut batch_duplicates = 0;

    for record in records {
        let hash = content_hash(&record.fields);
        if !seen_in_batch.insert(hash.clone()) {
            tracing::debug!(
                source_index = record.source_index,
                hash = %hash,
                "dropping in-batch duplicate"
            );
            batch_duplicates += 1;
            continue;
        }
        unique.push((record, hash));
    }

    let mut hashes = processed.clone();
    let mut new_documents = Vec::with_capacity(unique.len());
    let mut known_duplicates = 0;

    for (record, hash) in unique {
        if processed.contains(&hash) {
            tracing::debug!(
                source_index = record.source_index,
                hash = %hash,
                "skipping already-ingested record"
            );
            known_duplicates += 1;
            continue;
        }
        hashes.insert(hash.clone());
        new_documents.push(to_document(record, hash));
    }

    if batch_duplicates + known_duplicates > 0 {
        tracing::info!(
            batch_duplicates,
            known_duplicates,
            new = new_documents.len(),
            "filtered duplicate records"
        );
    }

    FilterOutcome {
        new_documents,
        hashes,
        batch_duplicates,
        known_duplicates,
    }
}

fn to_document(record: NormalizedRecord, content_hash: String) -> NormalizedDocument {
    let timestamp = record.fields.get("timestamp").unwrap_or_default().to_string();
    let occupancy_count = record
        .fields
        .get("occupancy_count")
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    NormalizedDocument {
        content: record.text,
        metadata: DocumentMetadata {
            timestamp,
            occupancy_count,
            content_hash,
        },
    }
}
