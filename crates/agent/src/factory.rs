//! Builds agents from shared, configured tools.

use crate::agent::{BankServiceAgent, DEFAULT_SEARCH_RESULTS};
use crate::tools::{ModelTool, RagTool, SearchBackend, WebSearchTool};
use crate::trace::{self, NoopTracer, RunTracer};
use std::sync::Arc;
use teller_core::{AppConfig, AppResult};
use teller_knowledge::KnowledgeBase;
use teller_prompt::PromptLibrary;

/// Creates one agent per chat session.
///
/// The model client, knowledge base, search backend and tracer are shared
/// by every agent; each agent owns only its history.
#[derive(Clone)]
pub struct AgentFactory {
    model: ModelTool,
    prompts: Arc<PromptLibrary>,
    knowledge: Option<Arc<KnowledgeBase>>,
    search: Option<Arc<dyn SearchBackend>>,
    tracer: Arc<dyn RunTracer>,
    rag_top_k: usize,
    search_results: u32,
}

impl AgentFactory {
    pub fn new(model: ModelTool, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            model,
            prompts,
            knowledge: None,
            search: None,
            tracer: Arc::new(NoopTracer),
            rag_top_k: crate::agent::DEFAULT_TOP_K,
            search_results: DEFAULT_SEARCH_RESULTS,
        }
    }

    /// Factory wired from configuration.
    ///
    /// Missing credentials leave the matching feature unavailable instead of
    /// failing.
    pub fn from_config(config: &AppConfig, knowledge: Option<Arc<KnowledgeBase>>) -> AppResult<Self> {
        let prompts = Arc::new(PromptLibrary::load(&config.prompts_dir())?);
        let client = teller_llm::from_settings(&config.llm)?;
        let model = ModelTool::from_settings(client, &config.llm, prompts.system_text()?);
        let search: Arc<dyn SearchBackend> = Arc::new(WebSearchTool::from_config(config)?);

        let mut factory = Self::new(model, prompts)
            .with_search(search)
            .with_tracer(trace::from_settings(&config.tracing)?)
            .with_limits(config.knowledge.top_k, config.search.num_results);

        if let Some(knowledge) = knowledge {
            factory = factory.with_knowledge(knowledge);
        }

        Ok(factory)
    }

    pub fn with_knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn RunTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_limits(mut self, rag_top_k: usize, search_results: u32) -> Self {
        self.rag_top_k = rag_top_k;
        self.search_results = search_results;
        self
    }

    pub fn knowledge(&self) -> Option<&Arc<KnowledgeBase>> {
        self.knowledge.as_ref()
    }

    pub fn search(&self) -> Option<&Arc<dyn SearchBackend>> {
        self.search.as_ref()
    }

    pub fn search_available(&self) -> bool {
        self.search.as_ref().is_some_and(|s| s.is_configured())
    }

    pub fn model_available(&self) -> bool {
        self.model.is_configured()
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracer.is_enabled()
    }

    /// A fresh agent with empty history.
    pub fn create(&self) -> BankServiceAgent {
        let mut agent = BankServiceAgent::new(self.model.clone(), self.prompts.clone())
            .with_tracer(self.tracer.clone())
            .with_limits(self.rag_top_k, self.search_results);

        if let Some(knowledge) = &self.knowledge {
            agent = agent.with_rag(RagTool::new(
                knowledge.clone(),
                self.model.clone(),
                self.prompts.clone(),
            ));
        }
        if let Some(search) = &self.search {
            agent = agent.with_search(search.clone());
        }

        agent
    }
}
