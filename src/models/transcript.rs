use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SessionIdStyle;

/// Who produced a turn. Serialized as `"User"` / `"Bot"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// One timestamped message in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// ISO-8601, UTC, millisecond precision (`2025-01-31T08:15:00.123Z`).
    pub timestamp: String,
    pub sender: Sender,
    pub message: String,
}

impl Turn {
    pub fn new(sender: Sender, message: impl Into<String>) -> Self {
        Self {
            timestamp: now_iso8601(),
            sender,
            message: message.into(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(Sender::User, message)
    }

    /// Empty Bot turn opened before the reply starts streaming.
    pub fn bot_placeholder() -> Self {
        Self::new(Sender::Bot, String::new())
    }
}

pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Ordered, append-only log of turns.
///
/// The only in-place mutation is `set_message`, used while a Bot reply
/// streams into its placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return its index.
    pub fn push(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    /// Replace the message of the turn at `index`. Returns false if out of range.
    pub fn set_message(&mut self, index: usize, message: &str) -> bool {
        match self.turns.get_mut(index) {
            Some(turn) => {
                turn.message.clear();
                turn.message.push_str(message);
                true
            }
            None => false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.sender == Sender::User)
            .map(|t| t.message.as_str())
    }

    /// Turns to send as chat context.
    ///
    /// With `include_pending` false, a trailing empty Bot turn is left out.
    pub fn history_for_request(&self, include_pending: bool) -> Vec<Turn> {
        let mut turns = self.turns.clone();
        if !include_pending {
            if let Some(last) = turns.last() {
                if last.sender == Sender::Bot && last.message.is_empty() {
                    turns.pop();
                }
            }
        }
        turns
    }
}

/// Opaque chat session identifier, fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate(style: SessionIdStyle) -> Self {
        match style {
            SessionIdStyle::Timestamp => Self(Utc::now().timestamp_millis().to_string()),
            SessionIdStyle::Uuid => Self(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
