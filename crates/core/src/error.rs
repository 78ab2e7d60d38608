//! Error types for the Teller support agent.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, including configuration, I/O, LLM, knowledge, prompt,
//! search, agent and session errors.

use thiserror::Error;

/// Unified error type for the Teller workspace.
///
/// All library functions return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Web search errors
    #[error("Search error: {0}")]
    Search(String),

    /// Agent workflow errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Chat session errors
    #[error("Session error: {0}")]
    Session(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_category() {
        let err = AppError::Search("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Search error: quota exceeded");
    }

    #[test]
    fn test_json_error_becomes_serialization() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
