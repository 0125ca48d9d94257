//! Builds model requests from instruction + history and records exchanges.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{BotError, BotResult};
use crate::instruction::InstructionStore;
use crate::provider::{ChatRequest, Message, Provider};
use crate::session::{Role, SessionRegistry};

/// Turns of history sent with each request unless configured otherwise.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Generation settings shared by every request.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub history_window: usize,
    pub timeout: Duration,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            history_window: DEFAULT_HISTORY_WINDOW,
            timeout: Duration::from_secs(60),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &relay_common::Config) -> Self {
        Self {
            model: config.gemini.model.clone(),
            history_window: config.conversation.history_window,
            timeout: Duration::from_secs(config.gemini.timeout_secs),
            temperature: config.gemini.temperature,
            max_tokens: config.gemini.max_output_tokens,
        }
    }
}

/// Composes requests and appends both sides of each exchange to history.
pub struct ConversationOrchestrator {
    registry: Arc<SessionRegistry>,
    instructions: Arc<InstructionStore>,
    provider: Arc<dyn Provider>,
    settings: GenerationSettings,
}

impl ConversationOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        instructions: Arc<InstructionStore>,
        provider: Arc<dyn Provider>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            registry,
            instructions,
            provider,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn instructions(&self) -> &Arc<InstructionStore> {
        &self.instructions
    }

    /// Answer `user_text` in the context of `channel_key`.
    ///
    /// The session lock is held across the model call so concurrent
    /// messages on one channel append in arrival order. History is only
    /// touched when generation succeeds.
    pub async fn respond(&self, channel_key: &str, user_text: &str) -> BotResult<String> {
        let session = self.registry.get_or_create(channel_key).await;
        let mut history = session.lock().await;

        let mut messages = self.leading_context().await;
        messages.extend(history.as_model_payload(self.settings.history_window));
        messages.push(Message::user(user_text));

        let reply = self.generate(messages).await?;

        history.append(Role::User, user_text);
        history.append(Role::Model, reply.clone());
        tracing::info!(
            channel = %channel_key,
            turns = history.len(),
            "Recorded exchange"
        );

        Ok(reply)
    }

    /// Produce a replacement for a rejected suggestion.
    ///
    /// Reads the channel's history without creating or modifying it.
    pub async fn regenerate(
        &self,
        channel_key: &str,
        original_message: &str,
        rejected_response: &str,
    ) -> BotResult<String> {
        let mut messages = self.leading_context().await;
        if let Some(session) = self.registry.get(channel_key).await {
            messages.extend(
                session
                    .lock()
                    .await
                    .as_model_payload(self.settings.history_window),
            );
        }
        messages.push(Message::user(original_message));
        messages.push(Message::model(rejected_response));
        messages.push(Message::user(rejection_feedback(
            original_message,
            rejected_response,
        )));

        tracing::info!(channel = %channel_key, "Regenerating rejected suggestion");
        self.generate(messages).await
    }

    async fn leading_context(&self) -> Vec<Message> {
        let instruction = self.instructions.load(false).await;
        vec![InstructionStore::format_for_model(&instruction)]
    }

    async fn generate(&self, messages: Vec<Message>) -> BotResult<String> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        match tokio::time::timeout(self.settings.timeout, self.provider.chat(request)).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => {
                tracing::warn!(provider = %self.provider.name(), error = %e, "Generation failed");
                Err(e.into())
            }
            Err(_) => Err(BotError::GenerationFailed(format!(
                "{} did not respond within {}s",
                self.provider.name(),
                self.settings.timeout.as_secs()
            ))),
        }
    }
}

/// Feedback turn asking the model to improve on a rejected proposal.
pub fn rejection_feedback(original_message: &str, rejected_response: &str) -> String {
    format!(
        "The user rejected your proposal.\n\n\
         **Original message**: {original_message}\n\
         **Your proposal**: {rejected_response}\n\n\
         Taking the user's feedback into account, please make a better proposal."
    )
}
