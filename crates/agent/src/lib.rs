//! Bank customer-support agent.
//!
//! This crate provides:
//! - The workflow graph routing each query to one tool
//! - Tools: knowledge base answers, direct model answers, web search
//! - Per-session chat history
//! - Run tracing

pub mod agent;
pub mod factory;
pub mod tools;
pub mod trace;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-export main types
pub use agent::{BankServiceAgent, ChatReply, APOLOGY};
pub use factory::AgentFactory;
pub use tools::{ModelTool, RagOutcome, RagTool, SearchBackend, SearchOutcome, WebSearchTool};
pub use trace::{LangSmithTracer, NoopTracer, Run, RunTracer};
pub use workflow::{AgentState, ChatMessage, Role, ToolChoice};
