//! Embedding providers.
//!
//! Concrete [`Embedder`] implementations over HTTP:
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` (default model `nomic-embed-text`)
//! - **[`OpenAIEmbedder`]**: `POST {url}/v1/embeddings`, authenticated with `OPENAI_API_KEY`
//!
//! Both split input into `batch_size` requests, enforce the configured
//! timeout and retry policy (see [`crate::http`]), and reject responses whose
//! vector count or dimensionality does not match the request.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use facility_rag::config::EmbeddingConfig;
//! # use facility_rag::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "ollama"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "nomic-embed-text");
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use facility_rag_core::embedding::Embedder;
use facility_rag_core::{Backend, RagError};
use serde_json::{json, Value};

use crate::config::EmbeddingConfig;
use crate::http::{parse_vector, post_json, RetryPolicy};

/// Request shape shared by the two providers.
struct Endpoint {
    client: reqwest::Client,
    policy: RetryPolicy,
    model: String,
    dims: Option<usize>,
    batch_size: usize,
}

impl Endpoint {
    fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let policy = RetryPolicy {
            backend: Backend::Embedding,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        };
        Ok(Self {
            client: policy.client()?,
            policy,
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.max(1),
        })
    }

    /// Check one batch of vectors against the request that produced it.
    fn check(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<(), RagError> {
        if vectors.len() != expected {
            return Err(self.policy.bad_response(format!(
                "expected {} vectors, got {}",
                expected,
                vectors.len()
            )));
        }
        let want = self.dims.or_else(|| vectors.first().map(|v| v.len()));
        if let Some(want) = want {
            if let Some(bad) = vectors.iter().find(|v| v.len() != want) {
                return Err(self.policy.bad_response(format!(
                    "expected {}-dimensional vectors, got {}",
                    want,
                    bad.len()
                )));
            }
        }
        Ok(())
    }
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    endpoint: Endpoint,
    url: String,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        Ok(Self {
            endpoint: Endpoint::new(config)?,
            url: format!("{}/api/embed", config.base_url()),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.endpoint.model
    }

    fn dims(&self) -> Option<usize> {
        self.endpoint.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let ep = &self.endpoint;
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(ep.batch_size) {
            let body = json!({ "model": ep.model, "input": batch });
            let reply = post_json(&ep.client, &ep.policy, &self.url, None, &body).await?;
            let vectors = parse_ollama_response(&reply, &ep.policy)?;
            ep.check(batch.len(), &vectors)?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Extract `embeddings[]` from an `/api/embed` reply.
fn parse_ollama_response(json: &Value, policy: &RetryPolicy) -> Result<Vec<Vec<f32>>, RagError> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| policy.bad_response("missing embeddings array"))?
        .iter()
        .map(|v| parse_vector(v, policy))
        .collect()
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    endpoint: Endpoint,
    url: String,
    api_key: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(k) if !k.is_empty() => k,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
        Ok(Self {
            endpoint: Endpoint::new(config)?,
            url: format!("{}/v1/embeddings", config.base_url()),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.endpoint.model
    }

    fn dims(&self) -> Option<usize> {
        self.endpoint.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let ep = &self.endpoint;
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(ep.batch_size) {
            let mut body = json!({ "model": ep.model, "input": batch });
            if let Some(dims) = ep.dims {
                body["dimensions"] = json!(dims);
            }
            let reply =
                post_json(&ep.client, &ep.policy, &self.url, Some(&self.api_key), &body).await?;
            let vectors = parse_openai_response(&reply, &ep.policy)?;
            ep.check(batch.len(), &vectors)?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value, policy: &RetryPolicy) -> Result<Vec<Vec<f32>>, RagError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| policy.bad_response("missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| policy.bad_response("missing embedding"))?;
        indexed.push((index, parse_vector(embedding, policy)?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the configured [`Embedder`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
