//! Per-conversation turn history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::BotResult;
use crate::provider::Message;

/// Turns retained per conversation unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 50;

/// Characters shown per turn in stats previews.
const PREVIEW_CHARS: usize = 50;

/// Turns listed in stats previews.
const PREVIEW_TURNS: usize = 5;

/// Speaker of a turn, in the two roles the model backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human message
    User,
    /// AI response
    #[serde(alias = "assistant")]
    Model,
}

impl Role {
    /// Wire spelling of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }

    /// Parse a role, accepting the legacy `assistant` spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "model" | "assistant" => Some(Self::Model),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Short display form of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPreview {
    pub role: Role,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

/// Counts and a short tail of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: usize,
    pub user_turns: usize,
    pub model_turns: usize,
    pub recent: Vec<TurnPreview>,
}

/// Fixed-capacity, oldest-first turn log for one conversation key.
///
/// Appending past capacity drops the oldest turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBuffer {
    key: String,
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl HistoryBuffer {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(key: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            key: key.into(),
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All retained turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Append a turn stamped with the current time.
    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push_back(Turn {
            role,
            text: text.into(),
            created_at: Utc::now(),
        });
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// The last `n` turns as model messages.
    pub fn as_model_payload(&self, n: usize) -> Vec<Message> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns
            .iter()
            .skip(skip)
            .map(|turn| Message {
                role: turn.role,
                content: turn.text.clone(),
            })
            .collect()
    }

    pub fn stats(&self) -> HistoryStats {
        let user_turns = self.turns.iter().filter(|t| t.role == Role::User).count();
        let recent = self
            .recent(PREVIEW_TURNS)
            .into_iter()
            .map(|turn| TurnPreview {
                role: turn.role,
                preview: preview(&turn.text),
                created_at: turn.created_at,
            })
            .collect();

        HistoryStats {
            total: self.turns.len(),
            user_turns,
            model_turns: self.turns.len() - user_turns,
            recent,
        }
    }

    /// Drop every turn. The buffer stays usable.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Serialize key, capacity and turns to JSON.
    pub fn to_portable(&self) -> BotResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a snapshot produced by [`to_portable`](Self::to_portable).
    pub fn from_portable(portable: &str) -> BotResult<Self> {
        let mut buffer: Self = serde_json::from_str(portable)?;
        buffer.capacity = buffer.capacity.max(1);
        buffer.enforce_capacity();
        Ok(buffer)
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
