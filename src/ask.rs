//! `frag ask`: startup ingestion, then one question.

use anyhow::{Context, Result};
use facility_rag_core::models::QaResult;

use crate::config::Config;
use crate::pipeline::Pipeline;

pub async fn run_ask(config: &Config, query: &str, json: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;

    // A failed ingestion leaves the pipeline Failed; `ask` reports it.
    if let Err(e) = pipeline.ingest_file(&config.ingest.input, false).await {
        tracing::warn!(error = %e, "startup ingestion failed");
    }

    let result = pipeline.ask(query).await.context("Query failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &QaResult) {
    println!("{}", result.answer);
    if result.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, doc) in result.sources.iter().enumerate() {
        println!(
            "  {}. [{}] occupancy {}",
            i + 1,
            doc.metadata.timestamp,
            doc.metadata.occupancy_count
        );
        println!("     {}", doc.content);
    }
}
