//! Lifecycle owner for the relay's shared state.
//!
//! Everything long-lived (session registry, pending decisions, instruction
//! cache) is created here and handed to the components that need it.

use std::sync::Arc;
use std::time::Duration;

use relay_common::Config;

use crate::github::{GitHubIssueTracker, IssueTracker};
use crate::hitl::{DecisionHandler, PendingDecisionStore};
use crate::instruction::InstructionStore;
use crate::orchestrator::{ConversationOrchestrator, GenerationSettings};
use crate::provider::{GeminiProvider, Provider};
use crate::service::RelayService;
use crate::session::SessionRegistry;
use crate::slack::{ReplySink, SlackChannel};

pub struct RelayRuntime {
    registry: Arc<SessionRegistry>,
    instructions: Arc<InstructionStore>,
    pending: Arc<PendingDecisionStore>,
    service: Arc<RelayService>,
}

impl RelayRuntime {
    /// Build every component from configuration.
    pub fn init(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(SessionRegistry::new(
            config.conversation.max_sessions,
            config.conversation.history_capacity,
        ));
        let instructions = Arc::new(InstructionStore::new(
            config.conversation.instruction_path.clone(),
        ));

        let provider: Arc<dyn Provider> = Arc::new(GeminiProvider::from_config(&config.gemini));
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&instructions),
            provider,
            GenerationSettings::from_config(config),
        ));

        let tracker = GitHubIssueTracker::from_config(&config.github)?
            .map(|t| Arc::new(t) as Arc<dyn IssueTracker>);
        if tracker.is_none() {
            tracing::info!("GitHub is not configured; replies are posted without review buttons");
        }
        let review_enabled = config.review.enabled && tracker.is_some();

        let pending = Arc::new(PendingDecisionStore::new(Duration::from_secs(
            config.review.decision_ttl_secs,
        )));
        let decisions = Arc::new(DecisionHandler::new(
            Arc::clone(&pending),
            Arc::clone(&orchestrator),
            tracker,
            config.github.labels.clone(),
        ));

        let bot_token = config.slack.bot_token.clone().unwrap_or_else(|| {
            tracing::warn!("Slack bot token is not set; replies will fail");
            String::new()
        });
        let sink: Arc<dyn ReplySink> =
            Arc::new(SlackChannel::new(bot_token, config.slack.api_base.clone()));

        let service = Arc::new(RelayService::new(
            orchestrator,
            decisions,
            sink,
            review_enabled,
        ));

        tracing::info!(
            max_sessions = config.conversation.max_sessions,
            history_capacity = config.conversation.history_capacity,
            model = %config.gemini.model,
            review = review_enabled,
            "Relay runtime initialized"
        );

        Ok(Self {
            registry,
            instructions,
            pending,
            service,
        })
    }

    pub fn service(&self) -> &Arc<RelayService> {
        &self.service
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn instructions(&self) -> &Arc<InstructionStore> {
        &self.instructions
    }

    pub fn pending(&self) -> &Arc<PendingDecisionStore> {
        &self.pending
    }

    /// Cancel pending expiry timers and drop in-memory state.
    pub async fn shutdown(&self) {
        let pending = self.pending.len().await;
        self.pending.shutdown().await;
        let sessions = self.registry.clear_all().await;
        tracing::info!(pending, sessions, "Relay runtime shut down");
    }
}
