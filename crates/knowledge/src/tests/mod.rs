//! Cross-module tests for retrieval quality.

mod rag_ranking;
