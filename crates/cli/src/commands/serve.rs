//! Serve command handler.
//!
//! Validates configuration, learns the data directory and starts the web
//! server.

use clap::Args;
use std::sync::Arc;
use teller_core::{config::AppConfig, AppResult};
use teller_knowledge::KnowledgeBase;
use teller_web::AppState;

/// Start the web chat server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (default from config, 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (default from config, 8501)
    #[arg(long)]
    pub port: Option<u16>,

    /// Skip learning the data directory at startup
    #[arg(long)]
    pub no_learn: bool,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");

        // Missing credentials only disable features
        config.validate();

        let knowledge = Arc::new(KnowledgeBase::from_config(config)?);

        if !self.no_learn {
            let report = knowledge.ingest_path(&config.data_dir()).await?;
            tracing::info!("Data directory: {}", report.summary());
        }

        let state = AppState::from_config(config, knowledge)?;

        let host = self.host.as_deref().unwrap_or(&config.server.host);
        let port = self.port.unwrap_or(config.server.port);

        println!("Teller is running at http://{}:{}", host, port);
        teller_web::serve(state, host, port).await
    }
}
