//! Human-in-the-loop review of model suggestions.
//!
//! A suggestion posted with approve/reject buttons is staged in
//! [`PendingDecisionStore`] under `"<channel>:<message ts>"`. The first
//! decision consumes it; an untouched entry expires after a fixed delay.

mod actions;
pub mod cards;
mod store;

pub use actions::{DecisionHandler, DecisionOutcome};
pub use store::{PendingDecisionStore, DEFAULT_DECISION_TTL};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build the decision key for a posted message.
pub fn decision_key(channel_id: &str, message_ts: &str) -> String {
    format!("{channel_id}:{message_ts}")
}

/// A suggestion waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub decision_key: String,
    pub original_message: String,
    pub proposed_response: String,
    pub user_id: String,
    pub channel_id: String,
    pub staged_at: DateTime<Utc>,
}

impl PendingDecision {
    pub fn new(
        channel_id: &str,
        message_ts: &str,
        user_id: &str,
        original_message: &str,
        proposed_response: &str,
    ) -> Self {
        Self {
            decision_key: decision_key(channel_id, message_ts),
            original_message: original_message.into(),
            proposed_response: proposed_response.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            staged_at: Utc::now(),
        }
    }
}

/// Who decided, and on which message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub decision_key: String,
    /// User who pressed the button
    pub user_id: String,
    pub channel_id: String,
    /// Timestamp of the message carrying the buttons
    pub message_ts: String,
}

/// A button press on a review message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DecisionEvent {
    Approve(DecisionContext),
    Reject(DecisionContext),
}

impl DecisionEvent {
    pub fn context(&self) -> &DecisionContext {
        match self {
            Self::Approve(ctx) | Self::Reject(ctx) => ctx,
        }
    }
}
