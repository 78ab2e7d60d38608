//! Prompt system for the Teller support agent.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Built-in bank prompts, overridable per deployment
//! - Handlebars template rendering

pub mod builder;
pub mod library;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::render;
pub use library::PromptLibrary;
pub use loader::{list_prompts, load_prompt, parse_prompt};
pub use types::{BuiltPrompt, PromptDefinition};
