//! `frag ingest` and `frag reset`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::pipeline::{IngestReport, Pipeline};

/// Ingest a log batch and print a summary.
///
/// `input` overrides `[ingest].input`.
pub async fn run_ingest(config: &Config, input: Option<PathBuf>, force_reset: bool) -> Result<()> {
    let input = input.unwrap_or_else(|| config.ingest.input.clone());
    let pipeline = Pipeline::from_config(config).await?;

    let report = pipeline
        .ingest_file(&input, force_reset)
        .await
        .with_context(|| format!("Ingestion of {} failed", input.display()))?;

    print_report(&input, force_reset, &report);
    Ok(())
}

fn print_report(input: &std::path::Path, force_reset: bool, report: &IngestReport) {
    println!("ingest {}", input.display());
    if force_reset {
        println!("  index reset before ingestion");
    }
    println!("  records: {}", report.records);
    println!("  occupied: {}", report.occupied);
    println!("  batch duplicates: {}", report.batch_duplicates);
    println!("  already ingested: {}", report.already_ingested);
    println!("  stored: {}", report.stored);
    println!("  index size: {}", report.index_size);
    if report.repaired_hashes {
        println!("  processed-hash file repaired from index");
    }
    println!("ok");
}

/// Discard the index and the processed-hash file.
pub async fn run_reset(config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;
    pipeline.reset().await.context("Reset failed")?;

    println!("reset");
    println!("  index: {}", config.index.dir.display());
    println!("  hash file: {}", pipeline.hash_file().path().display());
    println!("ok");
    Ok(())
}
