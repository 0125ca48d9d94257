//! Slack Block Kit rendering for review messages.

use serde::{Deserialize, Serialize};

/// Action id of the approve button.
pub const APPROVE_ACTION: &str = "review_approve";
/// Action id of the reject button.
pub const REJECT_ACTION: &str = "review_reject";
/// Slack rejects section blocks whose text exceeds this many characters.
pub const MAX_SECTION_TEXT: usize = 3000;

/// Slack Block Kit block types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    /// Section block
    Section { text: SlackTextObject },
    /// Actions block containing interactive elements
    Actions { elements: Vec<SlackButtonElement> },
}

/// Slack text object for block content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackTextObject {
    /// Type of text: "plain_text" or "mrkdwn"
    pub r#type: String,
    pub text: String,
}

impl SlackTextObject {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            r#type: "mrkdwn".into(),
            text: text.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            r#type: "plain_text".into(),
            text: text.into(),
        }
    }
}

/// Slack button element for actions block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackButtonElement {
    /// Element type, always "button"
    pub r#type: String,
    pub text: SlackTextObject,
    /// Button style: "primary" or "danger"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Action identifier for callback routing
    pub action_id: String,
    /// Decision key passed back in the callback
    pub value: String,
}

/// Markdown section capped at [`MAX_SECTION_TEXT`] characters.
fn section(text: &str) -> SlackBlock {
    const ELLIPSIS: &str = "...";
    let text = if text.chars().count() > MAX_SECTION_TEXT {
        let keep: String = text.chars().take(MAX_SECTION_TEXT - ELLIPSIS.len()).collect();
        keep + ELLIPSIS
    } else {
        text.to_string()
    };
    SlackBlock::Section {
        text: SlackTextObject::mrkdwn(text),
    }
}

fn button(label: &str, style: &str, action_id: &str, value: &str) -> SlackButtonElement {
    SlackButtonElement {
        r#type: "button".into(),
        text: SlackTextObject::plain(label),
        style: Some(style.into()),
        action_id: action_id.into(),
        value: value.into(),
    }
}

/// Suggestion text followed by Approve / Reject buttons.
///
/// The buttons carry `decision_key`; it is only known once the message has
/// been posted, so callers post first and attach buttons with an update.
/// Long text is cut in the section; the message text keeps the full copy.
pub fn review_blocks(text: &str, decision_key: &str) -> Vec<SlackBlock> {
    vec![
        section(text),
        SlackBlock::Actions {
            elements: vec![
                button("Approve", "primary", APPROVE_ACTION, decision_key),
                button("Reject", "danger", REJECT_ACTION, decision_key),
            ],
        },
    ]
}

/// A single markdown section, used for final states.
pub fn status_blocks(text: &str) -> Vec<SlackBlock> {
    vec![section(text)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_blocks_serialize_to_block_kit() {
        let blocks = review_blocks("Try caching.", "C1:1.2");
        let json = serde_json::to_value(&blocks).unwrap();

        assert_eq!(json[0]["type"], "section");
        assert_eq!(json[0]["text"]["type"], "mrkdwn");
        assert_eq!(json[0]["text"]["text"], "Try caching.");
        assert_eq!(json[1]["type"], "actions");
        assert_eq!(json[1]["elements"][0]["action_id"], APPROVE_ACTION);
        assert_eq!(json[1]["elements"][0]["style"], "primary");
        assert_eq!(json[1]["elements"][1]["action_id"], REJECT_ACTION);
        assert_eq!(json[1]["elements"][1]["style"], "danger");
        assert_eq!(json[1]["elements"][1]["value"], "C1:1.2");
    }

    #[test]
    fn test_status_blocks_have_no_actions() {
        let json = serde_json::to_value(status_blocks(":x: Rejected")).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_long_suggestion_section_is_truncated() {
        let text = "é".repeat(5000);
        let blocks = review_blocks(&text, "C1:1.2");

        let SlackBlock::Section { text: section } = &blocks[0] else {
            panic!("expected a section block");
        };
        assert_eq!(section.text.chars().count(), MAX_SECTION_TEXT);
        assert!(section.text.ends_with("..."));
        assert!(matches!(blocks[1], SlackBlock::Actions { .. }));
    }

    #[test]
    fn test_section_at_limit_is_kept_whole() {
        let text = "a".repeat(MAX_SECTION_TEXT);
        let json = serde_json::to_value(status_blocks(&text)).unwrap();
        assert_eq!(json[0]["text"]["text"], text.as_str());
    }
}
