//! Knowledge base command handlers.
//!
//! Handles learning documents, statistics and cleanup of the shared index.

use clap::Args;
use std::path::PathBuf;
use teller_core::{config::AppConfig, AppResult};
use teller_knowledge::{KnowledgeBase, LoadReport};

/// Add documents to the knowledge base
#[derive(Args, Debug)]
pub struct LearnCommand {
    /// Files or directories to learn from (default: the data directory)
    pub paths: Vec<PathBuf>,

    /// Remove existing documents before learning
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LearnCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing learn command");

        let knowledge = KnowledgeBase::from_config(config)?;

        if self.reset {
            knowledge.clean()?;
        }

        let paths = if self.paths.is_empty() {
            vec![config.data_dir()]
        } else {
            self.paths.clone()
        };

        let mut report = LoadReport::default();
        for path in &paths {
            report.merge(knowledge.ingest_path(path).await?);
        }

        if self.json {
            let output = serde_json::json!({
                "report": report,
                "summary": report.summary(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            for file in &report.files {
                match &file.error {
                    Some(error) => println!("  ✗ {}: {}", file.name, error),
                    None => println!("  ✓ {} ({} chunks)", file.name, file.chunks),
                }
            }
            println!("{}", report.summary());
        }

        Ok(())
    }
}

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// List indexed documents
    #[arg(long)]
    pub sources: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let knowledge = KnowledgeBase::from_config(config)?;
        let stats = knowledge.stats()?;
        let sources = if self.sources {
            knowledge.sources()?
        } else {
            Vec::new()
        };

        if self.json {
            let output = serde_json::json!({
                "sourcesCount": stats.sources_count,
                "chunksCount": stats.chunks_count,
                "dbSizeBytes": stats.db_size_bytes,
                "lastIngestedAt": stats.last_ingested_at,
                "sources": sources,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {:?}", config.index_path());
            println!("  Sources: {}", stats.sources_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(last) = stats.last_ingested_at {
                println!("  Last ingested: {}", last);
            }
            for source in &sources {
                println!(
                    "  - {} ({}, {} bytes, {})",
                    source.name, source.content_type, source.size_bytes, source.ingested_at
                );
            }
        }

        Ok(())
    }
}

/// Remove every document from the knowledge base
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clean command");

        KnowledgeBase::from_config(config)?.clean()?;
        println!("Knowledge base cleaned");

        Ok(())
    }
}
