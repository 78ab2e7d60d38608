//! Workflow graph state, nodes and routing.
//!
//! A reply runs `AnalyzeQuery`, then exactly one tool node chosen by the
//! routing decision, then `GenerateResponse`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// History messages included in prompts.
pub const CONTEXT_MESSAGES: usize = 3;

/// History messages kept between turns.
pub const MAX_HISTORY: usize = 10;

/// Routing decision for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ToolChoice {
    Rag,
    Model,
    Search,
}

impl ToolChoice {
    const KEYWORDS: [(&'static str, ToolChoice); 3] = [
        ("RAG", ToolChoice::Rag),
        ("MODEL", ToolChoice::Model),
        ("SEARCH", ToolChoice::Search),
    ];

    /// Parse a model's routing reply.
    ///
    /// Case-insensitive and matched on whole ASCII words, so a keyword next
    /// to CJK text still counts. The keyword appearing first wins and a reply
    /// with no keyword routes to `Model`.
    pub fn parse(reply: &str) -> Self {
        reply
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find_map(|word| {
                Self::KEYWORDS
                    .iter()
                    .find(|(keyword, _)| word.eq_ignore_ascii_case(keyword))
                    .map(|(_, choice)| *choice)
            })
            .unwrap_or(ToolChoice::Model)
    }

    /// Replace a choice whose tool cannot run with `Model`.
    pub fn resolve(self, availability: ToolAvailability) -> Self {
        match self {
            ToolChoice::Search if !availability.search => {
                tracing::info!("Web search not configured, answering with the model");
                ToolChoice::Model
            }
            ToolChoice::Rag if !availability.knowledge => {
                tracing::info!("Knowledge base is empty, answering with the model");
                ToolChoice::Model
            }
            choice => choice,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Rag => "RAG",
            ToolChoice::Model => "MODEL",
            ToolChoice::Search => "SEARCH",
        }
    }
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which optional tools can serve a query right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolAvailability {
    pub knowledge: bool,
    pub search: bool,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// State threaded through the workflow nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub query: String,
    pub chat_history: Vec<ChatMessage>,
    pub tool_choice: Option<ToolChoice>,
    pub tool_result: Option<String>,
    pub response: Option<String>,
}

impl AgentState {
    pub fn new(query: impl Into<String>, chat_history: Vec<ChatMessage>) -> Self {
        Self {
            query: query.into(),
            chat_history,
            ..Default::default()
        }
    }

    /// The most recent messages used as prompt context.
    pub fn context(&self) -> &[ChatMessage] {
        recent(&self.chat_history, CONTEXT_MESSAGES)
    }

    /// Record a finished exchange and trim history.
    pub fn push_exchange(&mut self, response: &str) {
        self.chat_history.push(ChatMessage::user(self.query.clone()));
        self.chat_history.push(ChatMessage::assistant(response));
        trim_history(&mut self.chat_history, MAX_HISTORY);
    }
}

/// Workflow graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    AnalyzeQuery,
    UseRag,
    UseModel,
    UseWebSearch,
    GenerateResponse,
    End,
}

impl Node {
    /// Name reported to run tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Node::AnalyzeQuery => "analyze_query",
            Node::UseRag => "use_rag",
            Node::UseModel => "use_model",
            Node::UseWebSearch => "use_web_search",
            Node::GenerateResponse => "generate_response",
            Node::End => "end",
        }
    }

    /// Tool node serving `choice`.
    pub fn for_choice(choice: ToolChoice) -> Self {
        match choice {
            ToolChoice::Rag => Node::UseRag,
            ToolChoice::Model => Node::UseModel,
            ToolChoice::Search => Node::UseWebSearch,
        }
    }

    /// Edge taken after this node ran on `state`.
    pub fn next(&self, state: &AgentState) -> Node {
        match self {
            Node::AnalyzeQuery => Node::for_choice(state.tool_choice.unwrap_or(ToolChoice::Model)),
            Node::UseRag | Node::UseModel | Node::UseWebSearch => Node::GenerateResponse,
            Node::GenerateResponse | Node::End => Node::End,
        }
    }
}

/// Last `n` messages of `history`.
pub fn recent(history: &[ChatMessage], n: usize) -> &[ChatMessage] {
    &history[history.len().saturating_sub(n)..]
}

/// Drop the oldest messages beyond `max`.
pub fn trim_history(history: &mut Vec<ChatMessage>, max: usize) {
    if history.len() > max {
        history.drain(..history.len() - max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_keywords() {
        assert_eq!(ToolChoice::parse("RAG"), ToolChoice::Rag);
        assert_eq!(ToolChoice::parse("MODEL"), ToolChoice::Model);
        assert_eq!(ToolChoice::parse("SEARCH"), ToolChoice::Search);
    }

    #[test]
    fn test_parse_case_and_whitespace() {
        assert_eq!(ToolChoice::parse("  search\n"), ToolChoice::Search);
        assert_eq!(ToolChoice::parse("Rag"), ToolChoice::Rag);
    }

    #[test]
    fn test_parse_surrounding_text_first_keyword_wins() {
        assert_eq!(
            ToolChoice::parse("I would use SEARCH rather than RAG here."),
            ToolChoice::Search
        );
        assert_eq!(ToolChoice::parse("Tool: rag (not model)"), ToolChoice::Rag);
        assert_eq!(ToolChoice::parse("使用RAG"), ToolChoice::Rag);
        assert_eq!(ToolChoice::parse("选择SEARCH工具"), ToolChoice::Search);
        assert_eq!(ToolChoice::parse("答案：SEARCH"), ToolChoice::Search);
        assert_eq!(ToolChoice::parse("我建议用rag回答"), ToolChoice::Rag);
    }

    #[test]
    fn test_parse_fallback_to_model() {
        assert_eq!(ToolChoice::parse(""), ToolChoice::Model);
        assert_eq!(ToolChoice::parse("I am not sure"), ToolChoice::Model);
        assert_eq!(ToolChoice::parse("on average, storage"), ToolChoice::Model);
    }

    #[test]
    fn test_resolve_falls_back_when_unavailable() {
        let none = ToolAvailability {
            knowledge: false,
            search: false,
        };
        assert_eq!(ToolChoice::Search.resolve(none), ToolChoice::Model);
        assert_eq!(ToolChoice::Rag.resolve(none), ToolChoice::Model);

        let all = ToolAvailability {
            knowledge: true,
            search: true,
        };
        assert_eq!(ToolChoice::Search.resolve(all), ToolChoice::Search);
        assert_eq!(ToolChoice::Rag.resolve(all), ToolChoice::Rag);
    }

    #[test]
    fn test_graph_edges() {
        let mut state = AgentState::new("q", Vec::new());
        assert_eq!(Node::AnalyzeQuery.next(&state), Node::UseModel);

        state.tool_choice = Some(ToolChoice::Search);
        assert_eq!(Node::AnalyzeQuery.next(&state), Node::UseWebSearch);
        assert_eq!(Node::UseWebSearch.next(&state), Node::GenerateResponse);
        assert_eq!(Node::GenerateResponse.next(&state), Node::End);
    }

    #[test]
    fn test_context_uses_last_three() {
        let history: Vec<ChatMessage> = (0..5).map(|i| ChatMessage::user(format!("m{}", i))).collect();
        let state = AgentState::new("q", history);
        let context: Vec<&str> = state.context().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(context, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_push_exchange_trims_to_ten() {
        let mut state = AgentState::new("latest", Vec::new());
        for i in 0..6 {
            state.chat_history.push(ChatMessage::user(format!("q{}", i)));
            state.chat_history.push(ChatMessage::assistant(format!("a{}", i)));
        }

        state.push_exchange("answer");

        assert_eq!(state.chat_history.len(), MAX_HISTORY);
        assert_eq!(state.chat_history[0].content, "q2");
        assert_eq!(state.chat_history[9], ChatMessage::assistant("answer"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
