//! Consume-and-branch handling of approve/reject decisions.

use chrono::Utc;
use std::sync::Arc;

use super::{DecisionEvent, PendingDecision, PendingDecisionStore};
use crate::error::BotError;
use crate::github::{IssueDraft, IssueRef, IssueTracker};
use crate::orchestrator::ConversationOrchestrator;

/// Result of one decision, ready to be rendered back to the chat.
#[derive(Debug)]
pub enum DecisionOutcome {
    /// Approved and filed.
    IssueCreated {
        decision: PendingDecision,
        issue: IssueRef,
    },
    /// Approved, but filing failed.
    IssueFailed {
        decision: PendingDecision,
        error: BotError,
    },
    /// Rejected; a replacement suggestion was generated.
    Regenerated {
        decision: PendingDecision,
        replacement: String,
    },
    /// Rejected; generating a replacement failed.
    RegenerationFailed {
        decision: PendingDecision,
        error: BotError,
    },
    /// Nothing was staged under the key (consumed, expired, or unknown).
    NotFound { decision_key: String },
}

/// Applies decision events to the pending store.
pub struct DecisionHandler {
    store: Arc<PendingDecisionStore>,
    orchestrator: Arc<ConversationOrchestrator>,
    tracker: Option<Arc<dyn IssueTracker>>,
    labels: Vec<String>,
}

impl DecisionHandler {
    pub fn new(
        store: Arc<PendingDecisionStore>,
        orchestrator: Arc<ConversationOrchestrator>,
        tracker: Option<Arc<dyn IssueTracker>>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            tracker,
            labels,
        }
    }

    pub fn store(&self) -> &Arc<PendingDecisionStore> {
        &self.store
    }

    /// Consume the staged entry and run the side effect for the decision.
    pub async fn handle(&self, event: &DecisionEvent) -> DecisionOutcome {
        let ctx = event.context();
        let decision = match self.store.consume(&ctx.decision_key).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::info!(key = %ctx.decision_key, reason = %e, "Decision on missing entry");
                return DecisionOutcome::NotFound {
                    decision_key: ctx.decision_key.clone(),
                };
            }
        };

        match event {
            DecisionEvent::Approve(ctx) => self.approve(decision, &ctx.user_id).await,
            DecisionEvent::Reject(_) => self.reject(decision).await,
        }
    }

    async fn approve(&self, decision: PendingDecision, approver_id: &str) -> DecisionOutcome {
        let Some(tracker) = &self.tracker else {
            return DecisionOutcome::IssueFailed {
                decision,
                error: BotError::IssueCreationFailed("no issue tracker is configured".into()),
            };
        };

        let draft = IssueDraft::from_decision(&decision, approver_id, Utc::now(), &self.labels);
        match tracker.create_issue(&draft).await {
            Ok(issue) => {
                tracing::info!(key = %decision.decision_key, number = issue.number, "Suggestion approved");
                DecisionOutcome::IssueCreated { decision, issue }
            }
            Err(error) => {
                tracing::warn!(key = %decision.decision_key, error = %error, "Issue creation failed");
                DecisionOutcome::IssueFailed { decision, error }
            }
        }
    }

    async fn reject(&self, decision: PendingDecision) -> DecisionOutcome {
        let result = self
            .orchestrator
            .regenerate(
                &decision.channel_id,
                &decision.original_message,
                &decision.proposed_response,
            )
            .await;

        match result {
            Ok(replacement) => DecisionOutcome::Regenerated {
                decision,
                replacement,
            },
            Err(error) => DecisionOutcome::RegenerationFailed { decision, error },
        }
    }
}
