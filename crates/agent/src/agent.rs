//! The bank customer-support agent.

use crate::tools::{ModelTool, RagTool, SearchBackend};
use crate::trace::{NoopTracer, RunSpan, RunTracer, RunType};
use crate::workflow::{AgentState, ChatMessage, Node, ToolAvailability, ToolChoice};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use teller_core::{AppError, AppResult};
use teller_prompt::{library, render, PromptLibrary};
use uuid::Uuid;

/// Reply shown to the customer when a chat turn fails.
pub const APOLOGY: &str = "Sorry, something went wrong while processing your request. \
Please try again later or contact a human agent.";

/// Knowledge base chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Web results requested per search.
pub const DEFAULT_SEARCH_RESULTS: u32 = 5;

/// Outcome of one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub answer: String,
    /// Tool that served the turn; `None` when the turn failed
    pub tool: Option<ToolChoice>,
    /// The answer is the fixed apology
    pub degraded: bool,
}

/// Workflow runner holding one conversation's history.
pub struct BankServiceAgent {
    model: ModelTool,
    rag: Option<RagTool>,
    search: Option<Arc<dyn SearchBackend>>,
    prompts: Arc<PromptLibrary>,
    tracer: Arc<dyn RunTracer>,
    history: Vec<ChatMessage>,
    rag_top_k: usize,
    search_results: u32,
}

impl BankServiceAgent {
    /// Agent answering with the model only.
    pub fn new(model: ModelTool, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            model,
            rag: None,
            search: None,
            prompts,
            tracer: Arc::new(NoopTracer),
            history: Vec::new(),
            rag_top_k: DEFAULT_TOP_K,
            search_results: DEFAULT_SEARCH_RESULTS,
        }
    }

    pub fn with_rag(mut self, rag: RagTool) -> Self {
        self.rag = Some(rag);
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

    /// Conversation so far, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        tracing::info!("Chat history cleared");
    }

    /// Which optional tools can serve the next query.
    pub fn availability(&self) -> ToolAvailability {
        ToolAvailability {
            knowledge: self.rag.as_ref().is_some_and(RagTool::is_ready),
            search: self.search.as_ref().is_some_and(|s| s.is_configured()),
        }
    }

    /// Answer one customer message.
    ///
    /// Never fails: errors are logged and answered with [`APOLOGY`], leaving
    /// history as it was.
    pub async fn chat(&mut self, query: &str) -> ChatReply {
        let span = RunSpan::begin("chat", RunType::Chain, json!({ "query": query }));
        let parent = span.id();

        match self.run(query, parent).await {
            Ok(state) => {
                let answer = state.response.clone().unwrap_or_default();
                self.tracer.record(span.succeed(json!({ "response": answer })));
                self.history = state.chat_history;
                ChatReply {
                    answer,
                    tool: state.tool_choice,
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::error!("Error while processing query: {}", e);
                self.tracer.record(span.fail(e.to_string()));
                ChatReply {
                    answer: APOLOGY.to_string(),
                    tool: None,
                    degraded: true,
                }
            }
        }
    }

    async fn run(&self, query: &str, parent: Uuid) -> AppResult<AgentState> {
        let mut state = AgentState::new(query, self.history.clone());
        let mut node = Node::AnalyzeQuery;

        while node != Node::End {
            self.step(node, &mut state, parent).await?;
            node = node.next(&state);
        }

        Ok(state)
    }

    async fn step(&self, node: Node, state: &mut AgentState, parent: Uuid) -> AppResult<()> {
        let run_type = match node {
            Node::UseRag | Node::UseModel | Node::UseWebSearch => RunType::Tool,
            _ => RunType::Chain,
        };
        let span = RunSpan::begin(
            node.name(),
            run_type,
            json!({ "query": state.query, "tool_choice": state.tool_choice }),
        )
        .with_parent(parent);

        let result = match node {
            Node::AnalyzeQuery => self.analyze_query(state).await,
            Node::UseRag => {
                self.use_rag(state).await;
                Ok(())
            }
            Node::UseModel => {
                self.use_model(state).await;
                Ok(())
            }
            Node::UseWebSearch => {
                self.use_web_search(state).await;
                Ok(())
            }
            Node::GenerateResponse => self.generate_response(state).await,
            Node::End => Ok(()),
        };

        let run = match &result {
            Ok(()) => span.succeed(json!({
                "tool_choice": state.tool_choice,
                "tool_result": state.tool_result,
                "response": state.response,
            })),
            Err(e) => span.fail(e.to_string()),
        };
        self.tracer.record(run);

        result
    }

    async fn analyze_query(&self, state: &mut AgentState) -> AppResult<()> {
        let prompt = render(
            self.prompts.get(library::ROUTE)?,
            &json!({ "history": state.context(), "query": state.query }),
        )?;

        let reply = self.model.query(&prompt.user).await?;
        let choice = ToolChoice::parse(&reply).resolve(self.availability());

        tracing::info!("Tool choice for query: {} (model said {:?})", choice, reply.trim());
        state.tool_choice = Some(choice);
        Ok(())
    }

    async fn use_rag(&self, state: &mut AgentState) {
        let result = match &self.rag {
            Some(rag) => rag
                .query(&state.query, self.rag_top_k)
                .await
                .map(|outcome| outcome.into_tool_result()),
            None => Err(AppError::Knowledge("No knowledge base available".to_string())),
        };
        state.tool_result = Some(tool_result("Knowledge base lookup", result));
    }

    async fn use_model(&self, state: &mut AgentState) {
        let result = self.model.query(&state.query).await;
        state.tool_result = Some(tool_result("Model call", result));
    }

    async fn use_web_search(&self, state: &mut AgentState) {
        let result = match &self.search {
            Some(search) => search
                .search(&state.query, self.search_results)
                .await
                .map(|outcome| outcome.format()),
            None => Err(AppError::Search("Web search is not available".to_string())),
        };
        state.tool_result = Some(tool_result("Web search", result));
    }

    async fn generate_response(&self, state: &mut AgentState) -> AppResult<()> {
        let prompt = render(
            self.prompts.get(library::ANSWER)?,
            &json!({
                "history": state.context(),
                "query": state.query,
                "tool_result": state.tool_result.as_deref().unwrap_or_default(),
            }),
        )?;

        let response = self.model.query(&prompt.user).await?;
        state.push_exchange(&response);
        state.response = Some(response);
        Ok(())
    }
}

/// Tool output, or a note that the tool failed.
fn tool_result(tool: &str, result: AppResult<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("{} failed: {}", tool, e);
            format!("{} failed: {}", tool, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{knowledge_base, FakeSearch, RecordingTracer, ScriptedLlm, MORTGAGE_DOC};
    use crate::tools::{SearchHit, SearchOutcome};

    fn agent(llm: &Arc<ScriptedLlm>) -> BankServiceAgent {
        let prompts = Arc::new(PromptLibrary::builtin().unwrap());
        BankServiceAgent::new(ModelTool::new(llm.clone(), "deepseek-chat", "persona"), prompts)
    }

    fn rag_tool(llm: &Arc<ScriptedLlm>, kb: Arc<teller_knowledge::KnowledgeBase>) -> RagTool {
        let prompts = Arc::new(PromptLibrary::builtin().unwrap());
        RagTool::new(kb, ModelTool::new(llm.clone(), "deepseek-chat", "persona"), prompts)
    }

    #[tokio::test]
    async fn test_model_route() {
        let llm = ScriptedLlm::new(["MODEL", "Raise it after six months.", "Final reply"]);
        let mut agent = agent(&llm);

        let reply = agent.chat("How can I raise my credit limit?").await;

        assert_eq!(reply.answer, "Final reply");
        assert_eq!(reply.tool, Some(ToolChoice::Model));
        assert!(!reply.degraded);

        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].prompt.contains("Current query: How can I raise my credit limit?"));
        assert_eq!(requests[1].prompt, "How can I raise my credit limit?");
        assert!(requests[2].prompt.contains("Tool result: Raise it after six months."));

        assert_eq!(
            agent.history(),
            &[
                ChatMessage::user("How can I raise my credit limit?"),
                ChatMessage::assistant("Final reply"),
            ]
        );
    }

    #[tokio::test]
    async fn test_search_without_backend_falls_back_to_model() {
        let llm = ScriptedLlm::new(["SEARCH", "model answer", "Final reply"]);
        let mut agent = agent(&llm);

        let reply = agent.chat("What is today's USD rate?").await;
        assert_eq!(reply.tool, Some(ToolChoice::Model));
        assert_eq!(llm.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_unconfigured_search_falls_back_to_model() {
        let llm = ScriptedLlm::new(["SEARCH", "model answer", "Final reply"]);
        let search = FakeSearch::unconfigured();
        let mut agent = agent(&llm).with_search(search.clone());

        let reply = agent.chat("What is today's USD rate?").await;
        assert_eq!(reply.tool, Some(ToolChoice::Model));
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_route_runs_only_search() {
        let llm = ScriptedLlm::new(["search", "Final reply"]);
        let search = FakeSearch::with_outcome(SearchOutcome::Results(vec![SearchHit {
            title: "USD/CNY".to_string(),
            snippet: "7.1".to_string(),
            link: "https://example.test/fx".to_string(),
        }]));
        let mut agent = agent(&llm).with_search(search.clone()).with_limits(4, 3);

        let reply = agent.chat("What is today's USD rate?").await;

        assert_eq!(reply.tool, Some(ToolChoice::Search));
        assert_eq!(search.calls(), vec![("What is today's USD rate?".to_string(), 3)]);

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("Title: USD/CNY"));
    }

    #[tokio::test]
    async fn test_failing_tool_still_answers() {
        let llm = ScriptedLlm::new(["SEARCH", "Final reply"]);
        let search = FakeSearch::failing("quota exceeded");
        let mut agent = agent(&llm).with_search(search);

        let reply = agent.chat("Latest deposit policy?").await;

        assert!(!reply.degraded);
        assert_eq!(reply.answer, "Final reply");
        assert!(llm.requests()[1].prompt.contains("Web search failed"));
        assert!(llm.requests()[1].prompt.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_rag_on_empty_knowledge_base_falls_back() {
        let llm = ScriptedLlm::new(["RAG", "model answer", "Final reply"]);
        let kb = knowledge_base();
        let mut agent = agent(&llm).with_rag(rag_tool(&llm, kb));

        let reply = agent.chat("What documents do I need for a mortgage?").await;
        assert_eq!(reply.tool, Some(ToolChoice::Model));
        assert_eq!(llm.requests()[1].prompt, "What documents do I need for a mortgage?");
    }

    #[tokio::test]
    async fn test_rag_route() {
        let llm = ScriptedLlm::new(["RAG", "Bring proof of income.", "Final reply"]);
        let kb = knowledge_base();
        kb.ingest_bytes("mortgage.md", MORTGAGE_DOC.as_bytes()).await.unwrap();
        let mut agent = agent(&llm).with_rag(rag_tool(&llm, kb));

        let reply = agent.chat("What does a mortgage application require?").await;

        assert_eq!(reply.tool, Some(ToolChoice::Rag));
        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].prompt.contains("Excerpt 1:"));
        assert!(requests[2].prompt.contains("Tool result: Bring proof of income."));
    }

    #[tokio::test]
    async fn test_routing_failure_returns_apology() {
        let llm = ScriptedLlm::failing();
        let mut agent = agent(&llm);

        let reply = agent.chat("Hello").await;

        assert_eq!(reply.answer, APOLOGY);
        assert!(reply.degraded);
        assert!(reply.tool.is_none());
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_response_failure_keeps_history() {
        let llm = ScriptedLlm::new(["MODEL", "a", "First reply", "MODEL", "b"]);
        let mut agent = agent(&llm);

        agent.chat("First").await;
        let before = agent.history().to_vec();

        let reply = agent.chat("Second").await;
        assert!(reply.degraded);
        assert_eq!(agent.history(), before.as_slice());
    }

    #[tokio::test]
    async fn test_history_context_and_trimming() {
        let mut script = Vec::new();
        for i in 0..6 {
            script.extend(["MODEL".to_string(), "tool".to_string(), format!("reply {}", i)]);
        }
        let llm = ScriptedLlm::new(script);
        let mut agent = agent(&llm);

        for i in 0..6 {
            agent.chat(&format!("question {}", i)).await;
        }

        assert_eq!(agent.history().len(), 10);
        assert_eq!(agent.history()[0], ChatMessage::user("question 1"));

        // The last routing prompt sees only the three most recent messages
        let requests = llm.requests();
        let last_route = &requests[15].prompt;
        assert!(last_route.contains("assistant: reply 4"));
        assert!(last_route.contains("user: question 4"));
        assert!(last_route.contains("assistant: reply 3"));
        assert!(!last_route.contains("user: question 3"));
    }

    #[tokio::test]
    async fn test_clear_history() {
        let llm = ScriptedLlm::new(["MODEL", "a", "reply"]);
        let mut agent = agent(&llm);
        agent.chat("Hi").await;
        assert!(!agent.history().is_empty());

        agent.clear_history();
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_runs_are_traced() {
        let llm = ScriptedLlm::new(["MODEL", "a", "reply"]);
        let tracer = RecordingTracer::new();
        let mut agent = agent(&llm).with_tracer(tracer.clone());

        agent.chat("Hi").await;

        let runs = tracer.runs();
        let names: Vec<&str> = runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["analyze_query", "use_model", "generate_response", "chat"]);

        let chat_id = runs[3].id;
        assert!(runs[..3].iter().all(|r| r.parent_run_id == Some(chat_id)));
        assert_eq!(runs[1].run_type, RunType::Tool);
    }
}
