//! Pipeline orchestrator.
//!
//! Owns the lifecycle `Uninitialized → Ready → (Ready | Failed)` and wires
//! the stages together:
//!
//! ```text
//! input JSON ─▶ normalize ─▶ filter_new ─▶ index.upsert ─▶ hash file ─▶ Ready(Answerer)
//! ```
//!
//! The state sits behind a `tokio::sync::RwLock`. [`Pipeline::ingest`] and
//! [`Pipeline::reset`] hold the write side for their whole run;
//! [`Pipeline::ask`] holds the read side, so a question asked mid-ingestion
//! waits for it to finish and never sees a partial batch.
//!
//! # Index / hash-file reconciliation
//!
//! Before each ingestion the processed-hash file is checked against the
//! hashes the index itself holds:
//!
//! | Hash file | Index | Outcome |
//! |-----------|-------|---------|
//! | missing or corrupt | any | rebuilt from the index (warning logged) |
//! | lists hashes the index lacks | any | [`RagError::Consistency`], reset required |
//! | subset of the index | any | extended with the index's extra hashes |
//!
//! An index built by a different embedder is also a consistency error.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use facility_rag_core::answer::Answerer;
use facility_rag_core::dedup::{filter_new, ProcessedHashSet};
use facility_rag_core::generation::Generator;
use facility_rag_core::models::QaResult;
use facility_rag_core::normalize::normalize_batch;
use facility_rag_core::store::VectorIndex;
use facility_rag_core::RagError;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::hash_file::{HashFile, LoadedHashes};
use crate::index::SqliteIndex;

pub enum PipelineState {
    Uninitialized,
    Ready(Answerer),
    /// Last ingestion failed with this message.
    Failed(String),
}

impl PipelineState {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Ready(_) => "ready",
            PipelineState::Failed(_) => "failed",
        }
    }
}

/// Snapshot of the lifecycle state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PipelineStatus {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Elements of the `logs` array.
    pub records: usize,
    pub occupied: usize,
    pub batch_duplicates: usize,
    pub already_ingested: usize,
    pub stored: usize,
    pub index_size: usize,
    /// The hash file had to be rebuilt or extended from the index.
    pub repaired_hashes: bool,
}

pub struct Pipeline {
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    hashes: HashFile,
    top_k: usize,
    state: RwLock<PipelineState>,
}

impl Pipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        hashes: HashFile,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            generator,
            hashes,
            top_k,
            state: RwLock::new(PipelineState::Uninitialized),
        }
    }

    /// Build the configured providers and open the SQLite index.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let index = SqliteIndex::open_or_create(&config.index.dir, embedder).await?;
        Ok(Self::new(
            Arc::new(index),
            generator,
            HashFile::new(config.index.hash_file_path()),
            config.retrieval.top_k,
        ))
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn hash_file(&self) -> &HashFile {
        &self.hashes
    }

    pub async fn status(&self) -> PipelineStatus {
        let state = self.state.read().await;
        PipelineStatus {
            state: state.label(),
            error: match &*state {
                PipelineState::Failed(msg) => Some(msg.clone()),
                _ => None,
            },
        }
    }

    /// Read `path` and ingest it. An unreadable file fails the pipeline like
    /// any other ingestion error.
    pub async fn ingest_file(&self, path: &Path, force_reset: bool) -> Result<IngestReport, RagError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => self.ingest(&text, force_reset).await,
            Err(e) => {
                let err = RagError::InvalidInput(format!("cannot read {}: {}", path.display(), e));
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    /// Run one ingestion batch. Idempotent: re-ingesting the same batch
    /// stores nothing new.
    pub async fn ingest(&self, input: &str, force_reset: bool) -> Result<IngestReport, RagError> {
        let mut state = self.state.write().await;
        match self.run_ingest(input, force_reset).await {
            Ok(report) => {
                tracing::info!(
                    stored = report.stored,
                    index_size = report.index_size,
                    "pipeline ready"
                );
                *state = PipelineState::Ready(Answerer::new(
                    self.index.clone(),
                    self.generator.clone(),
                    self.top_k,
                ));
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "ingestion failed");
                *state = PipelineState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn fail(&self, err: &RagError) {
        tracing::error!(error = %err, "ingestion failed");
        *self.state.write().await = PipelineState::Failed(err.to_string());
    }

    async fn run_ingest(&self, input: &str, force_reset: bool) -> Result<IngestReport, RagError> {
        let batch = normalize_batch(input)?;
        let records = batch.total;
        let occupied = batch.records.len();
        tracing::info!(records, occupied, "normalized batch");

        // Only once the batch parses: bad input leaves the index untouched.
        if force_reset {
            self.reset_storage().await?;
        }

        let (processed, repaired_hashes) = self.reconcile().await?;
        let outcome = filter_new(batch.records, &processed);

        let upsert = self.index.upsert(&outcome.new_documents).await?;
        // Only after the index commit.
        self.hashes.save(&outcome.hashes)?;

        Ok(IngestReport {
            records,
            occupied,
            batch_duplicates: outcome.batch_duplicates,
            already_ingested: outcome.known_duplicates + upsert.already_present,
            stored: upsert.stored,
            index_size: self.index.len().await?,
            repaired_hashes,
        })
    }

    /// Run the index / hash-file checks without ingesting anything.
    ///
    /// `Ok(true)` means the hash file would be rebuilt or extended from the
    /// index on the next ingestion.
    pub async fn check_consistency(&self) -> Result<bool, RagError> {
        let _state = self.state.read().await;
        Ok(self.reconcile().await?.1)
    }

    async fn reconcile(&self) -> Result<(ProcessedHashSet, bool), RagError> {
        reconcile_hashes(self.index.as_ref(), &self.hashes).await
    }

    /// Hash file first: if we stop halfway, the next run rebuilds the set
    /// from whatever the index still holds.
    async fn reset_storage(&self) -> Result<(), RagError> {
        self.hashes.remove()?;
        self.index.reset().await?;
        tracing::info!("index and processed-hash file discarded");
        Ok(())
    }

    /// Discard the index and the hash file. The pipeline is then
    /// uninitialized until the next ingestion.
    pub async fn reset(&self) -> Result<(), RagError> {
        let mut state = self.state.write().await;
        let result = self.reset_storage().await;
        *state = match &result {
            Ok(()) => PipelineState::Uninitialized,
            Err(e) => PipelineState::Failed(e.to_string()),
        };
        result
    }

    pub async fn ask(&self, query: &str) -> Result<QaResult, RagError> {
        let state = self.state.read().await;
        match &*state {
            PipelineState::Ready(answerer) => answerer.ask(query).await,
            PipelineState::Uninitialized => Err(RagError::NotReady(
                "no ingestion has completed; ingest logs first".into(),
            )),
            PipelineState::Failed(msg) => Err(RagError::InitializationFailed(msg.clone())),
        }
    }
}

/// Load the processed-hash set, checked against the index.
///
/// Needs no generator, so `frag stats` can run it against any index.
/// The returned flag is `true` when the set had to be rebuilt or extended
/// from the index.
pub async fn reconcile_hashes(
    index: &dyn VectorIndex,
    hashes: &HashFile,
) -> Result<(ProcessedHashSet, bool), RagError> {
    index.verify_embedder().await?;
    let indexed = index.content_hashes().await?;

    match hashes.load()? {
        LoadedHashes::Missing if indexed.is_empty() => Ok((indexed, false)),
        LoadedHashes::Missing => {
            tracing::warn!(
                path = %hashes.path().display(),
                hashes = indexed.len(),
                "processed-hash file missing, rebuilding from index"
            );
            Ok((indexed, true))
        }
        LoadedHashes::Corrupt(err) => {
            tracing::warn!(
                path = %hashes.path().display(),
                error = %err,
                hashes = indexed.len(),
                "processed-hash file corrupt, rebuilding from index"
            );
            Ok((indexed, true))
        }
        LoadedHashes::Loaded(mut set) => {
            let unknown = set.difference(&indexed).count();
            if unknown > 0 {
                return Err(RagError::Consistency(format!(
                    "{} lists {} hash(es) the index does not hold",
                    hashes.path().display(),
                    unknown
                )));
            }
            let extra = indexed.difference(&set).count();
            if extra > 0 {
                tracing::warn!(extra, "index holds hashes missing from the processed-hash file, adding them");
                set.extend(&indexed);
            }
            Ok((set, extra > 0))
        }
    }
}
