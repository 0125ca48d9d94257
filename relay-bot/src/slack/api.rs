//! Slack Web API client for posting and updating messages.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{ChannelError, ChannelResult, ReplySink};
use crate::hitl::cards::SlackBlock;

/// Slack channel using the Web API with a bot token.
pub struct SlackChannel {
    bot_token: String,
    api_base: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateMessageRequest<'a> {
    channel: &'a str,
    ts: &'a str,
    text: &'a str,
    /// An empty list clears any previous blocks.
    blocks: &'a [SlackBlock],
}

impl SlackChannel {
    /// Create a new Slack channel.
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &B,
    ) -> ChannelResult<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Slack {method} error: {e}")))?;

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Internal(format!("Failed to parse response: {e}")))?;

        if !data.get("ok").and_then(|o| o.as_bool()).unwrap_or(false) {
            let error = data
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            return Err(ChannelError::SendFailed(format!(
                "Slack {method} failed: {error}"
            )));
        }

        Ok(data)
    }
}

#[async_trait]
impl ReplySink for SlackChannel {
    async fn post(&self, channel: &str, text: &str) -> ChannelResult<String> {
        let data = self
            .call("chat.postMessage", &PostMessageRequest { channel, text })
            .await?;

        data.get("ts")
            .and_then(|t| t.as_str())
            .map(String::from)
            .ok_or_else(|| ChannelError::Internal("chat.postMessage returned no ts".into()))
    }

    async fn update(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        blocks: &[SlackBlock],
    ) -> ChannelResult<()> {
        self.call(
            "chat.update",
            &UpdateMessageRequest {
                channel,
                ts,
                text,
                blocks,
            },
        )
        .await
        .map(|_| ())
    }
}
