//! Generation providers.
//!
//! - **[`OllamaGenerator`]**: `POST {url}/api/generate` with `stream: false`
//! - **[`OpenAIGenerator`]**: `POST {url}/v1/chat/completions`, one user message
//!
//! Each call is a single prompt in, a single completion out. Timeout and
//! retries follow [`crate::http`].

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use facility_rag_core::generation::Generator;
use facility_rag_core::{Backend, RagError};
use serde_json::{json, Value};

use crate::config::GenerationConfig;
use crate::http::{post_json, RetryPolicy};

fn policy(config: &GenerationConfig) -> RetryPolicy {
    RetryPolicy {
        backend: Backend::Generation,
        max_retries: config.max_retries,
        timeout_secs: config.timeout_secs,
    }
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    policy: RetryPolicy,
    url: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, RagError> {
        let policy = policy(config);
        Ok(Self {
            client: policy.client()?,
            policy,
            url: format!("{}/api/generate", config.base_url()),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let mut body = json!({ "model": self.model, "prompt": prompt, "stream": false });
        if let Some(t) = self.temperature {
            body["options"] = json!({ "temperature": t });
        }
        let reply = post_json(&self.client, &self.policy, &self.url, None, &body).await?;
        text_at(&reply, &["response"], &self.policy)
    }
}

pub struct OpenAIGenerator {
    client: reqwest::Client,
    policy: RetryPolicy,
    url: String,
    model: String,
    temperature: Option<f32>,
    api_key: String,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(k) if !k.is_empty() => k,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let policy = policy(config);
        Ok(Self {
            client: policy.client()?,
            policy,
            url: format!("{}/v1/chat/completions", config.base_url()),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        let reply =
            post_json(&self.client, &self.policy, &self.url, Some(&self.api_key), &body).await?;
        let choice = reply
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| self.policy.bad_response("missing choices"))?;
        text_at(choice, &["message", "content"], &self.policy)
    }
}

/// Follow `path` through nested objects to a string.
fn text_at(json: &Value, path: &[&str], policy: &RetryPolicy) -> Result<String, RagError> {
    let mut cur = json;
    for key in path {
        cur = cur
            .get(key)
            .ok_or_else(|| policy.bad_response(format!("missing field '{}'", key)))?;
    }
    cur.as_str()
        .map(str::to_string)
        .ok_or_else(|| policy.bad_response(format!("field '{}' is not a string", path.join("."))))
}

/// Create the configured [`Generator`].
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
