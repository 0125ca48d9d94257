//! Domain errors for the relay bot.

use crate::provider::ProviderError;

/// Result type for relay operations.
pub type BotResult<T> = Result<T, BotError>;

/// Errors surfaced by the conversation and review flows.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// The AI backend failed, timed out, or returned nothing usable.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The instruction file could not be read. Callers fall back to the default text.
    #[error("Instruction load failed: {0}")]
    InstructionLoadFailed(String),

    /// The issue tracker rejected or timed out the request.
    #[error("Issue creation failed: {0}")]
    IssueCreationFailed(String),

    /// No staged suggestion exists under the key.
    #[error("No pending decision for key {0}")]
    DecisionNotFound(String),

    /// Chat platform delivery failure.
    #[error(transparent)]
    Channel(#[from] crate::slack::ChannelError),

    /// A portable session snapshot could not be encoded or decoded.
    #[error("Invalid session snapshot: {0}")]
    Portable(#[from] serde_json::Error),
}

impl From<ProviderError> for BotError {
    fn from(err: ProviderError) -> Self {
        Self::GenerationFailed(err.to_string())
    }
}

impl BotError {
    /// Detail text shown to users after the generic apology.
    pub fn user_detail(&self) -> String {
        match self {
            Self::GenerationFailed(detail) | Self::IssueCreationFailed(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}
