//! Index statistics and consistency overview for `frag stats`.

use anyhow::Result;

use facility_rag_core::store::VectorIndex;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::hash_file::{HashFile, LoadedHashes};
use crate::index::SqliteIndex;
use crate::pipeline::reconcile_hashes;

pub async fn run_stats(config: &Config) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let index = SqliteIndex::open_or_create(&config.index.dir, embedder).await?;
    let hash_file = HashFile::new(config.index.hash_file_path());

    let entries = index.len().await?;
    let db_size = std::fs::metadata(index.path()).map(|m| m.len()).unwrap_or(0);
    let hashes = match hash_file.load()? {
        LoadedHashes::Missing => "missing".to_string(),
        LoadedHashes::Corrupt(_) => "corrupt".to_string(),
        LoadedHashes::Loaded(set) => set.len().to_string(),
    };
    let built_with = match index.stored_embedder().await? {
        Some(meta) => match meta.dims {
            Some(d) => format!("{} ({} dims)", meta.model, d),
            None => meta.model,
        },
        None => "(empty)".to_string(),
    };
    let span = index.timestamp_span().await?;

    // Read-only: the repaired set is not written back here.
    let consistency = match reconcile_hashes(&index, &hash_file).await {
        Ok((_, false)) => "ok".to_string(),
        Ok((_, true)) => "hash file will be rebuilt from index on next ingest".to_string(),
        Err(e) => e.to_string(),
    };

    println!("Facility RAG: Index Stats");
    println!("=========================");
    println!();
    println!("  Index:       {}", index.path().display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Entries:     {}", entries);
    println!("  Hash file:   {}", hash_file.path().display());
    println!("  Hashes:      {}", hashes);
    println!("  Embedder:    {}", built_with);
    if let Some((first, last)) = span {
        println!("  Span:        {} .. {}", first, last);
    }
    println!("  Consistency: {}", consistency);
    println!();

    index.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
