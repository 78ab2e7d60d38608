//! Command handlers for the Teller CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod check;
pub mod knowledge;
pub mod search;
pub mod serve;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use check::CheckCommand;
pub use knowledge::{CleanCommand, LearnCommand, StatsCommand};
pub use search::SearchCommand;
pub use serve::ServeCommand;
