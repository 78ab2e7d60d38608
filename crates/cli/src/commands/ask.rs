//! Ask command handler.
//!
//! Runs one question through the full agent workflow.

use clap::Args;
use std::sync::Arc;
use teller_agent::AgentFactory;
use teller_core::{config::AppConfig, AppError, AppResult};
use teller_knowledge::KnowledgeBase;

/// Ask the agent one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        if self.question.trim().is_empty() {
            return Err(AppError::Other("Question must not be empty".to_string()));
        }

        let knowledge = Arc::new(KnowledgeBase::from_config(config)?);
        let factory = AgentFactory::from_config(config, Some(knowledge))?;
        let mut agent = factory.create();

        let reply = agent.chat(&self.question).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reply)?);
        } else {
            println!("{}", reply.answer);
            if let Some(tool) = reply.tool {
                println!();
                println!("(answered with {})", tool);
            }
        }

        Ok(())
    }
}
