//! Conversation turn and history types

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction (never stored, only assembled into requests)
    System,
    /// Message authored by a chat user
    User,
    /// Reply authored by the agent
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single exchange turn stored in conversation memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn
    pub role: Role,
    /// Turn text, stored untruncated
    pub text: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn stamped with the current time
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant turn stamped with the current time
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, ordered history of prior turns for one (agent, scope) pair.
///
/// The cap is enforced with FIFO eviction: dialogue order matters, so the
/// oldest turn is dropped first, never the least recently read one.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl Conversation {
    /// Create an empty conversation holding at most `max_turns` turns
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    /// Append a turn, evicting the oldest turn once the cap is reached
    pub fn push(&mut self, turn: Turn) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Iterate turns oldest first
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The last `n` turns, oldest first
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Change the cap, evicting the oldest turns if the history now
    /// exceeds it
    pub fn set_max_turns(&mut self, max_turns: usize) {
        self.max_turns = max_turns;
        while self.turns.len() > max_turns {
            self.turns.pop_front();
        }
    }
}
