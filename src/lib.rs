//! # Facility RAG
//!
//! Retrieval-augmented question answering over facility room logs.
//!
//! A batch of room logs (a JSON document with a `logs` array) is reduced to
//! occupied records, rendered as one canonical sentence each, deduplicated
//! by content hash, embedded, and stored in a SQLite vector index. Questions
//! are answered by retrieving the nearest records and handing them to a
//! generation model in a single prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐
//! │ room logs  │──▶│  Normalize   │──▶│   SQLite   │
//! │   JSON     │   │ Dedup+Embed  │   │  vectors   │
//! └────────────┘   └──────────────┘   └─────┬──────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │  (frag)  │       │  /ask    │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! Backend-agnostic logic lives in `facility-rag-core`; this crate adds
//! configuration, HTTP model providers, the SQLite index, processed-hash
//! persistence, the orchestrator, and the CLI / HTTP surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! frag ingest --input ./room_logs.json
//! frag ask "How many people were in the room at 10am?"
//! frag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`pipeline`] | Orchestrator and lifecycle state |
//! | [`index`] | SQLite vector index |
//! | [`hash_file`] | Processed-hash persistence |
//! | [`embedding`] | Ollama / OpenAI embedders |
//! | [`generation`] | Ollama / OpenAI generators |
//! | [`server`] | HTTP wrapper |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod ask;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod hash_file;
pub mod http;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod pipeline;
pub mod server;
pub mod stats;
