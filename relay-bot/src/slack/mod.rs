//! Slack adapter: Web API client, request signing, and payload parsing.

mod api;
mod payload;
mod signature;

pub use api::SlackChannel;
pub use payload::{parse_event, parse_interaction, parse_slash_command, EventsRequest, SlashCommand};
pub use signature::{sign_slack_request, verify_slack_signature, MAX_CLOCK_SKEW_SECS};

use async_trait::async_trait;

use crate::hitl::cards::SlackBlock;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Post a plain text message and return its timestamp.
    ///
    /// Interactive blocks need the timestamp, so they go on with [`update`](Self::update).
    async fn post(&self, channel: &str, text: &str) -> ChannelResult<String>;

    /// Replace the text and blocks of a posted message.
    async fn update(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        blocks: &[SlackBlock],
    ) -> ChannelResult<()>;
}
