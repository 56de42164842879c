//! Embedding backend trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! plus pure helpers for vector serialization and similarity.
//!
//! Concrete HTTP backends (Ollama, OpenAI) live in the `facility-rag`
//! application crate.

use async_trait::async_trait;

use crate::error::RagError;

/// An external embedding capability.
///
/// Implementations are expected to enforce their own timeout and to map
/// transport failures to the backend variants of [`RagError`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Returns the configured vector dimensionality, if known up front.
    fn dims(&self) -> Option<usize>;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Embed a single text.
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, RagError> {
    embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::BackendResponse {
            backend: crate::error::Backend::Embedding,
            message: "empty embedding response".into(),
        })
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use facility_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or vectors
/// of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
