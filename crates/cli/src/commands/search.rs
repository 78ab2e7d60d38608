//! Search command handler.

use clap::Args;
use teller_agent::tools::{SearchBackend, SearchOutcome, WebSearchTool};
use teller_core::{config::AppConfig, AppResult};

/// Run a web search
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search query
    pub query: String,

    /// Number of results (default from config)
    #[arg(short = 'n', long)]
    pub num: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let search = WebSearchTool::from_config(config)?;
        let num = self.num.unwrap_or_else(|| search.default_num_results());
        let outcome = search.search(&self.query, num).await?;

        if self.json {
            let hits: Vec<serde_json::Value> = match &outcome {
                SearchOutcome::Results(hits) => hits
                    .iter()
                    .map(|hit| {
                        serde_json::json!({
                            "title": hit.title,
                            "snippet": hit.snippet,
                            "link": hit.link,
                        })
                    })
                    .collect(),
                SearchOutcome::NoResults => Vec::new(),
            };
            println!("{}", serde_json::to_string_pretty(&hits)?);
        } else {
            println!("{}", outcome.format());
        }

        Ok(())
    }
}
