//! Core data models used throughout Facility RAG.
//!
//! These types represent the records, documents, and answers that flow
//! through the ingestion and question-answering pipeline:
//!
//! ```text
//! RawLogRecord ──normalize──▶ NormalizedRecord ──dedup──▶ NormalizedDocument
//!                                                               │
//!                                            VectorIndex ◀──────┘
//!                                                 │ query
//!                                                 ▼
//!                                  ScoredDocument ──answer──▶ QaResult
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One element of an ingestion batch's `logs` array, exactly as read.
///
/// Nested sub-objects (`power_consumption_watts`, `equipment_usage`,
/// `environmental_data`) are kept as-is; [`RawLogRecord::flatten`] turns
/// them into dot-addressed scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLogRecord {
    fields: Map<String, Value>,
}

impl RawLogRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Flatten nested objects into `parent.child` keys.
    ///
    /// Arrays and scalars are leaves. Keys are returned in sorted order.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        flatten_into(&mut out, None, &self.fields);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

fn flatten_into(out: &mut Vec<(String, Value)>, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten_into(out, Some(&path), inner),
            other => out.push((path, other.clone())),
        }
    }
}

/// The dedup-relevant fields of one record, canonically formatted, in
/// canonical order.
///
/// Produced by the normalizer; hashed by the deduplicator. Two records with
/// the same values compare equal here regardless of how their JSON spelled
/// the numbers (`100` vs `100.0`) or the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalFields {
    values: Vec<(&'static str, String)>,
}

impl CanonicalFields {
    pub fn new(values: Vec<(&'static str, String)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of the normalizer: flattened fields plus the canonical text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Position of the record in the source `logs` array.
    pub source_index: usize,
    pub fields: CanonicalFields,
    /// Human-readable rendering, fed to the embedder and the generator.
    pub text: String,
}

/// A document as stored in the vector index and returned as a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Structured metadata carried alongside each document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// ISO-8601 timestamp of the source record (`2024-01-01T10:00:00`).
    pub timestamp: String,
    pub occupancy_count: u64,
    /// SHA-256 hex digest of the record's dedup fields.
    pub content_hash: String,
}

/// A document returned by [`VectorIndex::query`](crate::store::VectorIndex::query)
/// with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: NormalizedDocument,
    pub score: f32,
}

/// The answer to one question.
///
/// `sources` are in retrieval rank order, without repeated content hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResult {
    pub answer: String,
    pub sources: Vec<NormalizedDocument>,
}
