//! Tools the workflow routes queries to.

pub mod model;
pub mod rag;
pub mod search;

pub use model::ModelTool;
pub use rag::{format_excerpts, RagOutcome, RagTool};
pub use search::{SearchBackend, SearchHit, SearchOutcome, WebSearchTool};
