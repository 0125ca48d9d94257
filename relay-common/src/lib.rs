//! Relay Common - Shared configuration, errors, and logging for the relay bot.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment overrides)
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and trace ID helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    Config, ConversationConfig, GeminiConfig, GitHubConfig, ObservabilityConfig, ReviewConfig,
    ServerConfig, SlackConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
    pub use crate::validation::ValidationError;
}
