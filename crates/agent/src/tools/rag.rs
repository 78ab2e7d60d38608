//! Knowledge base answers.

use super::ModelTool;
use serde_json::json;
use std::sync::Arc;
use teller_core::AppResult;
use teller_knowledge::{KnowledgeBase, ScoredChunk};
use teller_prompt::{library, render, PromptLibrary};

/// Result of a knowledge base query.
#[derive(Debug, Clone, PartialEq)]
pub enum RagOutcome {
    /// Nothing has been ingested yet
    Empty,
    /// No chunk scored above the relevance threshold
    NoMatch,
    /// Grounded answer and the names of the sources it drew on
    Answer { answer: String, sources: Vec<String> },
}

impl RagOutcome {
    /// Text handed to the response step.
    pub fn into_tool_result(self) -> String {
        match self {
            RagOutcome::Empty => {
                "The knowledge base is empty, please upload and process documents first".to_string()
            }
            RagOutcome::NoMatch => "No relevant documents found".to_string(),
            RagOutcome::Answer { answer, .. } => answer,
        }
    }
}

/// Retrieval followed by a grounded model answer.
#[derive(Clone)]
pub struct RagTool {
    knowledge: Arc<KnowledgeBase>,
    model: ModelTool,
    prompts: Arc<PromptLibrary>,
}

impl RagTool {
    pub fn new(knowledge: Arc<KnowledgeBase>, model: ModelTool, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            knowledge,
            model,
            prompts,
        }
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Whether there is anything to retrieve from.
    pub fn is_ready(&self) -> bool {
        match self.knowledge.is_empty() {
            Ok(empty) => !empty,
            Err(e) => {
                tracing::warn!("Could not read knowledge base state: {}", e);
                false
            }
        }
    }

    /// Answer `question` from the `k` most relevant chunks.
    pub async fn query(&self, question: &str, k: usize) -> AppResult<RagOutcome> {
        if self.knowledge.is_empty()? {
            return Ok(RagOutcome::Empty);
        }

        tracing::info!("Searching relevant documents: {}", question);
        let chunks = self.knowledge.search(question, k).await?;
        if chunks.is_empty() {
            return Ok(RagOutcome::NoMatch);
        }

        tracing::info!("Found {} relevant document excerpts", chunks.len());

        let excerpts = format_excerpts(&chunks);
        let prompt = render(
            self.prompts.get(library::RAG)?,
            &json!({ "question": question, "excerpts": excerpts }),
        )?;

        tracing::info!("Generating answer");
        let answer = self.model.query(&prompt.user).await?;

        let mut sources: Vec<String> = Vec::new();
        for chunk in &chunks {
            if !sources.contains(&chunk.source_name) {
                sources.push(chunk.source_name.clone());
            }
        }

        Ok(RagOutcome::Answer { answer, sources })
    }
}

/// Numbered excerpt blocks for the prompt.
pub fn format_excerpts(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, scored)| format!("Excerpt {}:\n{}\n", i + 1, scored.chunk.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{knowledge_base, ScriptedLlm};

    fn tool(knowledge: Arc<KnowledgeBase>, llm: Arc<ScriptedLlm>) -> RagTool {
        let prompts = Arc::new(PromptLibrary::builtin().unwrap());
        RagTool::new(knowledge, ModelTool::new(llm, "m", "s"), prompts)
    }

    #[tokio::test]
    async fn test_empty_knowledge_base() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        let rag = tool(knowledge_base(), llm.clone());

        assert!(!rag.is_ready());
        assert_eq!(rag.query("mortgage", 4).await.unwrap(), RagOutcome::Empty);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_no_match_skips_model() {
        let kb = knowledge_base();
        kb.ingest_bytes("mortgage.md", crate::testing::MORTGAGE_DOC.as_bytes())
            .await
            .unwrap();
        let llm = ScriptedLlm::new(Vec::<String>::new());
        let rag = tool(kb, llm.clone());

        assert_eq!(rag.query("xylophone quokka", 4).await.unwrap(), RagOutcome::NoMatch);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_answer_uses_excerpts() {
        let kb = knowledge_base();
        kb.ingest_bytes("mortgage.md", crate::testing::MORTGAGE_DOC.as_bytes())
            .await
            .unwrap();
        let llm = ScriptedLlm::new(["You need proof of income."]);
        let rag = tool(kb, llm.clone());

        let outcome = rag
            .query("What documents does a mortgage application require?", 4)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RagOutcome::Answer {
                answer: "You need proof of income.".to_string(),
                sources: vec!["mortgage.md".to_string()],
            }
        );

        let prompt = &llm.requests()[0].prompt;
        assert!(prompt.contains("Excerpt 1:"));
        assert!(prompt.contains("proof of income"));
        assert!(prompt.contains("What documents does a mortgage application require?"));
    }

    #[test]
    fn test_outcome_tool_result_text() {
        assert!(RagOutcome::Empty.into_tool_result().contains("empty"));
        assert_eq!(RagOutcome::NoMatch.into_tool_result(), "No relevant documents found");
    }
}
