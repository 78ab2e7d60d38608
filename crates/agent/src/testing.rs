//! Test doubles shared by the agent tests.

use crate::tools::{SearchBackend, SearchOutcome};
use crate::trace::{Run, RunTracer};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use teller_core::config::KnowledgeSettings;
use teller_core::{AppError, AppResult};
use teller_knowledge::embeddings::HashedProvider;
use teller_knowledge::KnowledgeBase;
use teller_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

pub const MORTGAGE_DOC: &str = "A mortgage application requires proof of income, an identity \
document and a property valuation report. Mortgage approval takes about ten working days.";

/// LLM that answers from a fixed script and records every request.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Fails every request.
    pub fn failing() -> Arc<Self> {
        Self::new(Vec::<String>::new())
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
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
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Search backend returning a fixed outcome.
pub struct FakeSearch {
    configured: bool,
    outcome: Result<SearchOutcome, String>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl FakeSearch {
    pub fn with_outcome(outcome: SearchOutcome) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            outcome: Ok(outcome),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            outcome: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            outcome: Ok(SearchOutcome::NoResults),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchBackend for FakeSearch {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn search(&self, query: &str, num: u32) -> AppResult<SearchOutcome> {
        self.calls.lock().unwrap().push((query.to_string(), num));
        self.outcome.clone().map_err(AppError::Search)
    }
}

/// Tracer keeping runs in memory.
#[derive(Default)]
pub struct RecordingTracer {
    runs: Mutex<Vec<Run>>,
}

impl RecordingTracer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runs(&self) -> Vec<Run> {
        self.runs.lock().unwrap().clone()
    }
}

impl RunTracer for RecordingTracer {
    fn record(&self, run: Run) {
        self.runs.lock().unwrap().push(run);
    }
}

/// Empty in-memory knowledge base with small chunks.
pub fn knowledge_base() -> Arc<KnowledgeBase> {
    let settings = KnowledgeSettings {
        chunk_size: 200,
        chunk_overlap: 20,
        ..Default::default()
    };
    Arc::new(KnowledgeBase::in_memory(settings, Arc::new(HashedProvider::new(2048))).unwrap())
}
