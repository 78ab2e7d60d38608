//! Test doubles for the web tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use teller_agent::{AgentFactory, ModelTool};
use teller_core::config::KnowledgeSettings;
use teller_core::{AppError, AppResult};
use teller_knowledge::embeddings::HashedProvider;
use teller_knowledge::KnowledgeBase;
use teller_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use teller_prompt::PromptLibrary;

/// LLM answering from a fixed script.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Llm("service unavailable".to_string()))?;
        Ok(LlmResponse {
            content: reply,
            model: request.model.clone(),
            usage: LlmUsage::default(),
            finish_reason: None,
        })
    }
}

/// Factory whose agents answer from `replies`, backed by an empty
/// in-memory knowledge base.
pub fn factory(replies: Vec<&str>) -> AgentFactory {
    let llm = Arc::new(ScriptedLlm {
        replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
    });
    let prompts = Arc::new(PromptLibrary::builtin().unwrap());
    let settings = KnowledgeSettings {
        chunk_size: 200,
        chunk_overlap: 20,
        ..Default::default()
    };
    let knowledge =
        KnowledgeBase::in_memory(settings, Arc::new(HashedProvider::new(256))).unwrap();

    AgentFactory::new(ModelTool::new(llm, "deepseek-chat", "persona"), prompts)
        .with_knowledge(Arc::new(knowledge))
}
