//! Deterministic backends and log fixtures shared by the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use facility_rag::hash_file::HashFile;
use facility_rag::index::SqliteIndex;
use facility_rag::pipeline::Pipeline;
use facility_rag_core::embedding::Embedder;
use facility_rag_core::generation::Generator;
use facility_rag_core::store::memory::InMemoryIndex;
use facility_rag_core::{Backend, RagError};
use serde_json::{json, Value};

pub const DIMS: usize = 32;

/// Bag-of-words embedder: each token bumps one of `DIMS` buckets.
pub struct MockEmbedder {
    model: String,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockEmbedder {
    pub fn new() -> Arc<Self> {
        Self::with_model("mock-embed")
    }

    pub fn with_model(model: &str) -> Arc<Self> {
        Arc::new(Self {
            model: model.to_string(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

pub fn bow_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = token
            .to_lowercase()
            .bytes()
            .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % DIMS] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        Some(DIMS)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::BackendUnavailable {
                backend: Backend::Embedding,
                message: "connection refused".into(),
            });
        }
        Ok(texts.iter().map(|t| bow_vector(t)).collect())
    }
}

/// Records every prompt; answers with a fixed sentence.
pub struct MockGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl MockGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn model_name(&self) -> &str {
        "mock-gen"
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::BackendTimeout {
                backend: Backend::Generation,
                timeout_secs: 120,
            });
        }
        Ok("The room held 5 people.".to_string())
    }
}

/// One log record with every field the normalizer requires.
pub fn log(timestamp: &str, status: &str, count: u64) -> Value {
    json!({
        "timestamp": timestamp,
        "occupancy_status": status,
        "occupancy_count": count,
        "energy_consumption_kwh": 1.25,
        "power_consumption_watts": {
            "lighting": 120,
            "hvac_fan": 300,
            "standby_misc": 15,
            "total": 435
        },
        "equipment_usage": {
            "lights_on_hours": 1.0,
            "air_conditioner_on_hours": 1.0,
            "projector_on_hours": 0.5,
            "computer_on_hours": 0.75
        },
        "environmental_data": {
            "temperature_celsius": 22.5,
            "humidity_percent": 41
        }
    })
}

pub fn batch(records: &[Value]) -> String {
    json!({ "logs": records }).to_string()
}

pub fn memory_pipeline(
    dir: &Path,
    embedder: Arc<MockEmbedder>,
    generator: Arc<MockGenerator>,
) -> Pipeline {
    Pipeline::new(
        Arc::new(InMemoryIndex::new(embedder)),
        generator,
        HashFile::new(dir.join("processed_hashes.txt")),
        4,
    )
}

pub async fn sqlite_pipeline(
    dir: &Path,
    embedder: Arc<MockEmbedder>,
    generator: Arc<MockGenerator>,
) -> Pipeline {
    let index = SqliteIndex::open_or_create(&dir.join("index"), embedder)
        .await
        .unwrap();
    Pipeline::new(
        Arc::new(index),
        generator,
        HashFile::new(dir.join("processed_hashes.txt")),
        4,
    )
}
