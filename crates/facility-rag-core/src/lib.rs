//! # Facility RAG Core
//!
//! Backend-agnostic logic for Facility RAG: log normalization, content-hash
//! deduplication, the vector index trait, the embedding and generation
//! traits, and the retrieval-augmented answerer.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O. The
//! application crate supplies the concrete index, providers, and
//! persistence of the processed-hash set.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`normalize`] | Raw `logs` batch → canonical fields + summary text |
//! | [`dedup`] | Content hash, processed-hash set, two-phase filtering |
//! | [`store`] | [`store::VectorIndex`] trait and in-memory implementation |
//! | [`embedding`] | [`embedding::Embedder`] trait and vector utilities |
//! | [`generation`] | [`generation::Generator`] trait |
//! | [`answer`] | [`answer::Answerer`]: retrieve, dedup, stuff, generate |
//! | [`error`] | [`RagError`] and its kinds |

pub mod answer;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod normalize;
pub mod store;

pub use error::{Backend, ErrorKind, RagError};
