//! Relay Bot - Slack to Gemini relay with human review of suggestions.
//!
//! ## Architecture
//!
//! ```text
//! Slack → webhook → routes → RelayService → ConversationOrchestrator → Gemini
//!                                 ↓                    ↑
//! Slack ←── ReplySink ←───────────┘       SessionRegistry / InstructionStore
//!
//! Approve/Reject → DecisionHandler → PendingDecisionStore → GitHub | regenerate
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod commands;
pub mod error;
pub mod github;
pub mod hitl;
pub mod instruction;
pub mod orchestrator;
pub mod provider;
pub mod routes;
pub mod runtime;
pub mod service;
pub mod session;
pub mod slack;

// Re-export commonly used types
pub use commands::{AdminCommand, CommandError, InstructionAction};
pub use error::{BotError, BotResult};
pub use github::{GitHubIssueTracker, IssueDraft, IssueRef, IssueTracker};
pub use hitl::{
    DecisionContext, DecisionEvent, DecisionHandler, DecisionOutcome, PendingDecision,
    PendingDecisionStore,
};
pub use instruction::{InstructionStore, DEFAULT_INSTRUCTION};
pub use orchestrator::{ConversationOrchestrator, GenerationSettings};
pub use provider::{GeminiProvider, Provider, ProviderError};
pub use routes::{build_router, create_state, RelayState};
pub use runtime::RelayRuntime;
pub use service::{BotEvent, CommandRequest, InboundEvent, RelayService};
pub use session::{HistoryBuffer, Role, SessionRegistry, Turn};
pub use slack::{ReplySink, SlackChannel};

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use relay_common::Config;

/// Start the relay HTTP server and event processor.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    let runtime = RelayRuntime::init(config)?;
    let (state, rx) = create_state(config.slack.signing_secret.clone());
    if state.signing_secret.is_none() {
        tracing::warn!("Slack signing secret is not set; requests are not verified");
    }
    let router = build_router(state, &config.server);

    // Spawn the event processor
    let processor_handle = RelayService::spawn_processor(Arc::clone(runtime.service()), rx);

    tracing::info!("Starting Relay Bot on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Clean up on shutdown
    processor_handle.abort();
    runtime.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
