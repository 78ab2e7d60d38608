//! Teller Core Library
//!
//! This crate provides the foundational utilities for the Teller support agent:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure (stderr plus rolling log file)
//! - Configuration management and validation

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ConfigStatus};
pub use error::{AppError, AppResult};
