//! Parsing of inbound Slack HTTP payloads.
//!
//! - Events API: JSON body
//! - Interactivity: form body with a JSON `payload` field
//! - Slash commands: form body

use serde::Deserialize;

use super::{ChannelError, ChannelResult};
use crate::hitl::cards::{APPROVE_ACTION, REJECT_ACTION};
use crate::hitl::{decision_key, DecisionContext, DecisionEvent};
use crate::service::InboundEvent;

// ============================================================================
// Events API
// ============================================================================

/// What an Events API request asks of us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventsRequest {
    /// Echo the challenge back.
    UrlVerification(String),
    /// A user message to relay.
    Message(InboundEvent),
    /// Acknowledge and drop, with the reason.
    Ignored(&'static str),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventEnvelope {
    UrlVerification { challenge: String },
    EventCallback { event: MessageEvent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Classify an Events API body.
pub fn parse_event(body: &[u8]) -> ChannelResult<EventsRequest> {
    let envelope: EventEnvelope = serde_json::from_slice(body)
        .map_err(|e| ChannelError::InvalidMessage(format!("Invalid event body: {e}")))?;

    let event = match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            return Ok(EventsRequest::UrlVerification(challenge))
        }
        EventEnvelope::EventCallback { event } => event,
        EventEnvelope::Other => return Ok(EventsRequest::Ignored("unsupported envelope")),
    };

    if event.kind != "message" {
        return Ok(EventsRequest::Ignored("unsupported event type"));
    }
    if event.bot_id.is_some() || event.subtype.is_some() {
        return Ok(EventsRequest::Ignored("bot message or subtype"));
    }

    let text = event.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(EventsRequest::Ignored("empty text"));
    }

    match (event.channel, event.user, event.ts) {
        (Some(channel_id), Some(user_id), Some(ts)) => Ok(EventsRequest::Message(InboundEvent {
            channel_id,
            user_id,
            text,
            ts,
        })),
        _ => Ok(EventsRequest::Ignored("missing channel, user, or ts")),
    }
}

// ============================================================================
// Interactivity
// ============================================================================

#[derive(Debug, Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    user: IdOnly,
    #[serde(default)]
    channel: Option<IdOnly>,
    #[serde(default)]
    container: Option<Container>,
    #[serde(default)]
    message: Option<MessageRef>,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Container {
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    message_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct Action {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

/// Extract a review decision from an interactivity body.
///
/// Returns `None` for interactions that are not review button presses.
pub fn parse_interaction(body: &[u8]) -> ChannelResult<Option<DecisionEvent>> {
    let raw = form_field(body, "payload")
        .ok_or_else(|| ChannelError::InvalidMessage("Missing payload field".into()))?;
    let payload: InteractionPayload = serde_json::from_str(&raw)
        .map_err(|e| ChannelError::InvalidMessage(format!("Invalid interaction payload: {e}")))?;

    if payload.kind != "block_actions" {
        return Ok(None);
    }

    let Some(action) = payload
        .actions
        .iter()
        .find(|a| a.action_id == APPROVE_ACTION || a.action_id == REJECT_ACTION)
    else {
        return Ok(None);
    };

    let channel_id = payload
        .channel
        .map(|c| c.id)
        .or_else(|| payload.container.as_ref().and_then(|c| c.channel_id.clone()))
        .ok_or_else(|| ChannelError::InvalidMessage("Interaction has no channel".into()))?;
    let message_ts = payload
        .container
        .and_then(|c| c.message_ts)
        .or_else(|| payload.message.map(|m| m.ts))
        .ok_or_else(|| ChannelError::InvalidMessage("Interaction has no message ts".into()))?;

    let key = action
        .value
        .clone()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| decision_key(&channel_id, &message_ts));

    let ctx = DecisionContext {
        decision_key: key,
        user_id: payload.user.id,
        channel_id,
        message_ts,
    };

    Ok(Some(if action.action_id == APPROVE_ACTION {
        DecisionEvent::Approve(ctx)
    } else {
        DecisionEvent::Reject(ctx)
    }))
}

// ============================================================================
// Slash commands
// ============================================================================

/// Raw slash command fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
}

/// Parse a slash command body.
pub fn parse_slash_command(body: &[u8]) -> ChannelResult<SlashCommand> {
    let field = |name: &str| {
        form_field(body, name)
            .ok_or_else(|| ChannelError::InvalidMessage(format!("Missing {name} field")))
    };

    Ok(SlashCommand {
        command: field("command")?,
        text: form_field(body, "text").unwrap_or_default(),
        user_id: field("user_id")?,
        channel_id: field("channel_id")?,
    })
}

fn form_field(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Vec<u8> {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
            .into_bytes()
    }

    #[test]
    fn test_url_verification_echoes_challenge() {
        let body = br#"{"type":"url_verification","challenge":"abc123","token":"t"}"#;
        assert_eq!(
            parse_event(body).unwrap(),
            EventsRequest::UrlVerification("abc123".into())
        );
    }

    #[test]
    fn test_message_event_becomes_inbound() {
        let body = serde_json::json!({
            "type": "event_callback",
            "event": {"type": "message", "channel": "C1", "user": "U1", "text": "hi", "ts": "1.2"}
        });
        let parsed = parse_event(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            parsed,
            EventsRequest::Message(InboundEvent {
                channel_id: "C1".into(),
                user_id: "U1".into(),
                text: "hi".into(),
                ts: "1.2".into(),
            })
        );
    }

    #[test]
    fn test_bot_subtype_and_empty_messages_are_ignored() {
        for event in [
            serde_json::json!({"type": "message", "subtype": "bot_message", "channel": "C1", "text": "x", "ts": "1"}),
            serde_json::json!({"type": "message", "bot_id": "B1", "channel": "C1", "user": "U1", "text": "x", "ts": "1"}),
            serde_json::json!({"type": "message", "subtype": "message_changed", "channel": "C1", "ts": "1"}),
            serde_json::json!({"type": "message", "channel": "C1", "user": "U1", "text": "   ", "ts": "1"}),
            serde_json::json!({"type": "reaction_added", "user": "U1"}),
        ] {
            let body = serde_json::json!({"type": "event_callback", "event": event});
            assert!(matches!(
                parse_event(body.to_string().as_bytes()).unwrap(),
                EventsRequest::Ignored(_)
            ));
        }
    }

    #[test]
    fn test_malformed_event_is_invalid() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(ChannelError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_approve_button_becomes_decision() {
        let payload = serde_json::json!({
            "type": "block_actions",
            "user": {"id": "U2"},
            "channel": {"id": "C1"},
            "container": {"channel_id": "C1", "message_ts": "1700.5"},
            "actions": [{"action_id": "review_approve", "value": "C1:1700.5"}]
        });
        let body = form(&[("payload", payload.to_string().as_str())]);

        let event = parse_interaction(&body).unwrap().unwrap();
        assert_eq!(
            event,
            DecisionEvent::Approve(DecisionContext {
                decision_key: "C1:1700.5".into(),
                user_id: "U2".into(),
                channel_id: "C1".into(),
                message_ts: "1700.5".into(),
            })
        );
    }

    #[test]
    fn test_reject_without_value_derives_key_from_message() {
        let payload = serde_json::json!({
            "type": "block_actions",
            "user": {"id": "U2"},
            "container": {"channel_id": "C9", "message_ts": "42.0"},
            "actions": [{"action_id": "review_reject"}]
        });
        let body = form(&[("payload", payload.to_string().as_str())]);

        let event = parse_interaction(&body).unwrap().unwrap();
        assert!(matches!(event, DecisionEvent::Reject(ref ctx) if ctx.decision_key == "C9:42.0"));
    }

    #[test]
    fn test_unrelated_interactions_are_skipped() {
        let payload = serde_json::json!({
            "type": "block_actions",
            "user": {"id": "U2"},
            "container": {"channel_id": "C9", "message_ts": "42.0"},
            "actions": [{"action_id": "something_else"}]
        });
        let body = form(&[("payload", payload.to_string().as_str())]);
        assert_eq!(parse_interaction(&body).unwrap(), None);

        let modal = serde_json::json!({"type": "view_submission", "user": {"id": "U2"}});
        let body = form(&[("payload", modal.to_string().as_str())]);
        assert_eq!(parse_interaction(&body).unwrap(), None);
    }

    #[test]
    fn test_slash_command_fields() {
        let body = form(&[
            ("command", "/system-instruction"),
            ("text", "set Be kind"),
            ("user_id", "U1"),
            ("channel_id", "C1"),
        ]);
        let cmd = parse_slash_command(&body).unwrap();
        assert_eq!(cmd.command, "/system-instruction");
        assert_eq!(cmd.text, "set Be kind");

        let missing = form(&[("command", "/clear-context")]);
        assert!(parse_slash_command(&missing).is_err());
    }
}
