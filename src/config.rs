//! TOML configuration.
//!
//! Every section carries serde defaults, so an empty file yields a working
//! local setup (Ollama on `localhost:11434`, index under `./data/index`).
//! [`load_config`] parses and validates; nothing else in the crate reads the
//! file directly.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";
pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    /// Processed-hash file. Defaults to `processed_hashes.txt` beside `dir`.
    #[serde(default)]
    pub hash_file: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            hash_file: None,
        }
    }
}

impl IndexConfig {
    pub fn hash_file_path(&self) -> PathBuf {
        match &self.hash_file {
            Some(p) => p.clone(),
            None => match self.dir.parent() {
                Some(parent) => parent.join("processed_hashes.txt"),
                None => PathBuf::from("processed_hashes.txt"),
            },
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_input")]
    pub input: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
        }
    }
}

fn default_input() -> PathBuf {
    PathBuf::from("./room_logs.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    facility_rag_core::answer::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            url: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn base_url(&self) -> String {
        base_url(&self.provider, self.url.as_deref())
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            url: None,
            temperature: None,
            max_retries: 0,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn base_url(&self) -> String {
        base_url(&self.provider, self.url.as_deref())
    }
}

fn default_generation_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_generation_timeout() -> u64 {
    120
}

fn base_url(provider: &str, configured: Option<&str>) -> String {
    let url = match configured {
        Some(u) => u,
        None if provider == "openai" => OPENAI_DEFAULT_URL,
        None => OLLAMA_DEFAULT_URL,
    };
    url.trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.batch_size < 1 {
        bail!("embedding.batch_size must be >= 1");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when set");
    }
    if config.embedding.timeout_secs < 1 {
        bail!("embedding.timeout_secs must be >= 1");
    }
    if config.generation.timeout_secs < 1 {
        bail!("generation.timeout_secs must be >= 1");
    }

    for (section, provider) in [
        ("embedding", &config.embedding.provider),
        ("generation", &config.generation.provider),
    ] {
        match provider.as_str() {
            "ollama" | "openai" => {}
            other => bail!(
                "Unknown {} provider: '{}'. Must be ollama or openai.",
                section,
                other
            ),
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.generation.model, "llama3.2:3b");
        assert_eq!(config.embedding.max_retries, 0);
        assert_eq!(config.embedding.base_url(), OLLAMA_DEFAULT_URL);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(
            config.index.hash_file_path(),
            PathBuf::from("./data/processed_hashes.txt")
        );
    }

    #[test]
    fn test_explicit_hash_file_and_urls() {
        let config = parse_config(
            r#"
[index]
dir = "/tmp/frag/index"
hash_file = "/tmp/elsewhere/hashes.txt"

[embedding]
provider = "openai"
model = "text-embedding-3-small"

[generation]
url = "http://gpu-box:11434/"
"#,
        )
        .unwrap();
        assert_eq!(
            config.index.hash_file_path(),
            PathBuf::from("/tmp/elsewhere/hashes.txt")
        );
        assert_eq!(config.embedding.base_url(), OPENAI_DEFAULT_URL);
        assert_eq!(config.generation.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn test_rejects_invalid_values() {
        for bad in [
            "[retrieval]\ntop_k = 0",
            "[embedding]\nbatch_size = 0",
            "[embedding]\ndims = 0",
            "[embedding]\nprovider = \"local\"",
            "[generation]\nprovider = \"anthropic\"",
            "[generation]\ntimeout_secs = 0",
        ] {
            assert!(parse_config(bad).is_err(), "accepted: {}", bad);
        }
    }
}
