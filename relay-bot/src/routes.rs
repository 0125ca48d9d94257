//! HTTP routes for the Slack webhooks.
//!
//! - `GET /health`
//! - `POST /slack/events` (Events API)
//! - `POST /slack/actions` (interactivity: review buttons)
//! - `POST /slack/commands` (slash commands)
//!
//! Handlers only verify, parse, and enqueue; the work happens in
//! [`RelayService`](crate::service::RelayService).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use relay_common::config::ServerConfig;

use crate::commands::AdminCommand;
use crate::service::{BotEvent, CommandRequest};
use crate::slack::{self, EventsRequest};

/// Slack payloads are small; anything larger is not from Slack.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const EVENT_QUEUE_SIZE: usize = 100;

// ============================================================================
// State
// ============================================================================

/// Shared state for the HTTP server.
pub struct RelayState {
    /// Queue feeding the relay processor
    pub event_tx: mpsc::Sender<BotEvent>,
    /// Slack signing secret; requests are unchecked when absent
    pub signing_secret: Option<String>,
}

/// Create the HTTP state and the receiving end of its event queue.
pub fn create_state(
    signing_secret: Option<String>,
) -> (Arc<RelayState>, mpsc::Receiver<BotEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);

    let state = Arc::new(RelayState {
        event_tx: tx,
        signing_secret: signing_secret.filter(|s| !s.is_empty()),
    });

    (state, rx)
}

#[derive(Debug, Serialize)]
struct ChallengeResponse {
    challenge: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "OK"
}

fn verify_request(state: &RelayState, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(ref secret) = state.signing_secret else {
        return true;
    };

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    };
    let timestamp = header("x-slack-request-timestamp");
    let signature = header("x-slack-signature");

    let ok = slack::verify_slack_signature(
        secret,
        timestamp,
        body,
        signature,
        chrono::Utc::now().timestamp(),
    );
    if !ok {
        tracing::warn!(
            "Slack signature verification failed (signature: {})",
            if signature.is_empty() { "missing" } else { "invalid" }
        );
    }
    ok
}

async fn enqueue(state: &RelayState, event: BotEvent) -> Response {
    if let Err(e) = state.event_tx.send(event).await {
        tracing::error!(error = %e, "Relay processor is not running");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    StatusCode::OK.into_response()
}

async fn slack_events(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !verify_request(&state, &headers, &body) {
        return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
    }

    // Slack redelivers when we are slow to ack; the first delivery is already queued.
    if let Some(retry) = headers.get("x-slack-retry-num") {
        tracing::debug!(retry = ?retry, "Dropping Slack retry");
        return StatusCode::OK.into_response();
    }

    match slack::parse_event(&body) {
        Ok(EventsRequest::UrlVerification(challenge)) => {
            Json(ChallengeResponse { challenge }).into_response()
        }
        Ok(EventsRequest::Message(message)) => enqueue(&state, BotEvent::Message(message)).await,
        Ok(EventsRequest::Ignored(reason)) => {
            tracing::debug!(reason, "Ignoring Slack event");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting Slack event");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn slack_actions(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !verify_request(&state, &headers, &body) {
        return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
    }

    match slack::parse_interaction(&body) {
        Ok(Some(decision)) => enqueue(&state, BotEvent::Decision(decision)).await,
        Ok(None) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting Slack interaction");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn slack_commands(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !verify_request(&state, &headers, &body) {
        return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
    }

    let raw = match slack::parse_slash_command(&body) {
        Ok(raw) => raw,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    // Usage errors go straight back to the invoking user as an ephemeral reply.
    let command = match AdminCommand::parse(&raw.command, &raw.text) {
        Ok(command) => command,
        Err(e) => return (StatusCode::OK, e.to_string()).into_response(),
    };

    enqueue(
        &state,
        BotEvent::Command(CommandRequest {
            command,
            user_id: raw.user_id,
            channel_id: raw.channel_id,
        }),
    )
    .await
}

// ============================================================================
// Router Builder
// ============================================================================

/// Build the relay HTTP router.
pub fn build_router(state: Arc<RelayState>, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .route("/slack/actions", post(slack_actions))
        .route("/slack/commands", post(slack_commands))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs.max(1),
        )))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hitl::DecisionEvent;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router(secret: Option<&str>) -> (Router, mpsc::Receiver<BotEvent>) {
        let (state, rx) = create_state(secret.map(String::from));
        (build_router(state, &ServerConfig::default()), rx)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn message_event() -> serde_json::Value {
        serde_json::json!({
            "type": "event_callback",
            "event": {"type": "message", "channel": "C1", "user": "U1", "text": "hi", "ts": "1.0"}
        })
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        let (app, _rx) = router(None);
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "OK");
    }

    #[tokio::test]
    async fn test_url_verification_returns_challenge() {
        let (app, _rx) = router(None);
        let resp = app
            .oneshot(post_json(
                "/slack/events",
                serde_json::json!({"type": "url_verification", "challenge": "xyz"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, r#"{"challenge":"xyz"}"#);
    }

    #[tokio::test]
    async fn test_message_event_is_enqueued() {
        let (app, mut rx) = router(None);
        let resp = app
            .oneshot(post_json("/slack/events", message_event()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(matches!(rx.try_recv(), Ok(BotEvent::Message(ref m)) if m.text == "hi"));
    }

    #[tokio::test]
    async fn test_retries_are_dropped() {
        let (app, mut rx) = router(None);
        let mut req = post_json("/slack/events", message_event());
        req.headers_mut()
            .insert("x-slack-retry-num", "1".parse().unwrap());
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let (app, mut rx) = router(Some("secret"));
        let mut req = post_json("/slack/events", message_event());
        req.headers_mut()
            .insert("x-slack-request-timestamp", "1".parse().unwrap());
        req.headers_mut()
            .insert("x-slack-signature", "v0=00".parse().unwrap());
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_valid_signature_is_accepted() {
        let (app, mut rx) = router(Some("secret"));
        let body = message_event().to_string();
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = slack::sign_slack_request("secret", &ts, body.as_bytes());

        let req = Request::post("/slack/events")
            .header("x-slack-request-timestamp", ts)
            .header("x-slack-signature", sig)
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_button_press_is_enqueued() {
        let (app, mut rx) = router(None);
        let payload = serde_json::json!({
            "type": "block_actions",
            "user": {"id": "U2"},
            "container": {"channel_id": "C1", "message_ts": "5.0"},
            "actions": [{"action_id": "review_approve", "value": "C1:5.0"}]
        })
        .to_string();
        let resp = app
            .oneshot(post_form("/slack/actions", &[("payload", payload.as_str())]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(matches!(
            rx.try_recv(),
            Ok(BotEvent::Decision(DecisionEvent::Approve(ref ctx))) if ctx.decision_key == "C1:5.0"
        ));
    }

    #[tokio::test]
    async fn test_malformed_interaction_is_bad_request() {
        let (app, _rx) = router(None);
        let resp = app
            .oneshot(post_form("/slack/actions", &[("other", "x")]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_slash_command_is_enqueued() {
        let (app, mut rx) = router(None);
        let resp = app
            .oneshot(post_form(
                "/slack/commands",
                &[
                    ("command", "/clear-context"),
                    ("text", ""),
                    ("user_id", "U1"),
                    ("channel_id", "C1"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            rx.try_recv().unwrap(),
            BotEvent::Command(CommandRequest {
                command: AdminCommand::ClearContext,
                user_id: "U1".into(),
                channel_id: "C1".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_slash_command_usage_error_is_answered_inline() {
        let (app, mut rx) = router(None);
        let resp = app
            .oneshot(post_form(
                "/slack/commands",
                &[
                    ("command", "/system-instruction"),
                    ("text", "delete"),
                    ("user_id", "U1"),
                    ("channel_id", "C1"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.starts_with("Usage:"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stopped_processor_is_unavailable() {
        let (app, rx) = router(None);
        drop(rx);
        let resp = app
            .oneshot(post_json("/slack/events", message_event()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
