//! Event processing: messages, review decisions, and slash commands.
//!
//! ```text
//! Slack → routes → mpsc<BotEvent> → RelayService (one task per event)
//!                                        ↓
//!                 orchestrator / decision handler / commands → ReplySink
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::commands::AdminCommand;
use crate::error::{BotError, BotResult};
use crate::hitl::cards::{review_blocks, status_blocks};
use crate::hitl::{DecisionEvent, DecisionHandler, DecisionOutcome, PendingDecision};
use crate::orchestrator::ConversationOrchestrator;
use crate::slack::ReplySink;

/// A user message in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Conversation key
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
}

/// A parsed slash command and who issued it where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: AdminCommand,
    pub user_id: String,
    pub channel_id: String,
}

/// Everything the HTTP layer hands to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum BotEvent {
    Message(InboundEvent),
    Decision(DecisionEvent),
    Command(CommandRequest),
}

impl BotEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Decision(DecisionEvent::Approve(_)) => "approve",
            Self::Decision(DecisionEvent::Reject(_)) => "reject",
            Self::Command(_) => "command",
        }
    }

    fn channel_id(&self) -> &str {
        match self {
            Self::Message(ev) => ev.channel_id.as_str(),
            Self::Decision(ev) => ev.context().channel_id.as_str(),
            Self::Command(req) => req.channel_id.as_str(),
        }
    }
}

/// Reply sent when a user-triggered operation fails.
pub fn error_reply(user_id: &str, error: &BotError) -> String {
    format!(
        "<@{user_id}> Sorry, an error occurred: {}",
        error.user_detail()
    )
}

/// Turns events into replies.
pub struct RelayService {
    orchestrator: Arc<ConversationOrchestrator>,
    decisions: Arc<DecisionHandler>,
    sink: Arc<dyn ReplySink>,
    review_enabled: bool,
}

impl RelayService {
    pub fn new(
        orchestrator: Arc<ConversationOrchestrator>,
        decisions: Arc<DecisionHandler>,
        sink: Arc<dyn ReplySink>,
        review_enabled: bool,
    ) -> Self {
        Self {
            orchestrator,
            decisions,
            sink,
            review_enabled,
        }
    }

    pub fn review_enabled(&self) -> bool {
        self.review_enabled
    }

    /// Handle one event to completion.
    pub async fn process(&self, event: BotEvent) -> BotResult<()> {
        match event {
            BotEvent::Message(message) => self.handle_message(message).await,
            BotEvent::Decision(decision) => self.handle_decision(decision).await,
            BotEvent::Command(command) => self.handle_command(command).await,
        }
    }

    async fn handle_message(&self, message: InboundEvent) -> BotResult<()> {
        tracing::info!(
            channel = %message.channel_id,
            user = %message.user_id,
            "Message received"
        );

        let reply = match self
            .orchestrator
            .respond(&message.channel_id, &message.text)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(channel = %message.channel_id, error = %e, "Failed to generate reply");
                self.sink
                    .post(&message.channel_id, &error_reply(&message.user_id, &e))
                    .await?;
                return Ok(());
            }
        };

        let text = format!("<@{}> {reply}", message.user_id);
        if self.review_enabled {
            self.post_for_review(
                &message.channel_id,
                &message.user_id,
                &message.text,
                &reply,
                &text,
            )
            .await?;
        } else {
            self.sink.post(&message.channel_id, &text).await?;
        }
        Ok(())
    }

    /// Post `text`, stage the suggestion under the posted message, then
    /// attach the review buttons.
    async fn post_for_review(
        &self,
        channel_id: &str,
        user_id: &str,
        original_message: &str,
        proposal: &str,
        text: &str,
    ) -> BotResult<String> {
        let ts = self.sink.post(channel_id, text).await?;
        let decision = PendingDecision::new(channel_id, &ts, user_id, original_message, proposal);
        let key = decision.decision_key.clone();

        let store = self.decisions.store();
        store.stage(decision).await;

        if let Err(e) = self
            .sink
            .update(channel_id, &ts, text, &review_blocks(text, &key))
            .await
        {
            let _ = store.consume(&key).await;
            return Err(e.into());
        }

        tracing::debug!(key = %key, "Suggestion awaiting review");
        Ok(ts)
    }

    async fn handle_decision(&self, event: DecisionEvent) -> BotResult<()> {
        let ctx = event.context().clone();
        let outcome = self.decisions.handle(&event).await;

        let status = match outcome {
            DecisionOutcome::IssueCreated { issue, .. } => format!(
                ":white_check_mark: *Approved*\nCreated GitHub issue <{}|#{}>",
                issue.url, issue.number
            ),
            DecisionOutcome::IssueFailed { error, .. } => format!(
                ":white_check_mark: *Approved*\n:warning: Failed to create the GitHub issue: {}",
                error.user_detail()
            ),
            DecisionOutcome::RegenerationFailed { error, .. } => format!(
                ":x: *Rejected*\n:warning: Could not generate a new proposal: {}",
                error.user_detail()
            ),
            DecisionOutcome::NotFound { .. } => {
                ":hourglass: This suggestion is no longer pending (already handled or expired)."
                    .to_string()
            }
            DecisionOutcome::Regenerated {
                decision,
                replacement,
            } => {
                self.sink
                    .update(
                        &ctx.channel_id,
                        &ctx.message_ts,
                        "Rejected",
                        &status_blocks(":x: *Rejected*"),
                    )
                    .await?;

                let text = format!("<@{}> 🤖 *New proposal:*\n{replacement}", decision.user_id);
                self.post_for_review(
                    &ctx.channel_id,
                    &decision.user_id,
                    &decision.original_message,
                    &replacement,
                    &text,
                )
                .await?;
                return Ok(());
            }
        };

        self.sink
            .update(&ctx.channel_id, &ctx.message_ts, &status, &status_blocks(&status))
            .await?;
        Ok(())
    }

    async fn handle_command(&self, request: CommandRequest) -> BotResult<()> {
        tracing::info!(
            channel = %request.channel_id,
            user = %request.user_id,
            command = ?request.command,
            "Command received"
        );

        let reply = request
            .command
            .execute(
                &request.channel_id,
                self.orchestrator.registry(),
                self.orchestrator.instructions(),
            )
            .await;

        self.sink
            .post(&request.channel_id, &format!("<@{}> {reply}", request.user_id))
            .await?;
        Ok(())
    }

    /// Start a background processor that handles events from a channel.
    pub fn spawn_processor(
        service: Arc<Self>,
        mut rx: mpsc::Receiver<BotEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Relay processor started");

            while let Some(event) = rx.recv().await {
                let service = Arc::clone(&service);
                let span = tracing::info_span!(
                    "relay_event",
                    trace_id = %relay_common::logging::generate_trace_id(),
                    kind = event.kind(),
                    channel = %event.channel_id(),
                );

                // Process each event in its own task
                tokio::spawn(
                    async move {
                        if let Err(e) = service.process(event).await {
                            tracing::error!(error = %e, "Failed to process event");
                        }
                    }
                    .instrument(span),
                );
            }

            tracing::info!("Relay processor stopped");
        })
    }
}
