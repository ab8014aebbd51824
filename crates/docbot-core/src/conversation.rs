//! Bounded conversation history.
//!
//! Turns are always appended as a user/assistant pair and trimmed from the
//! oldest end, so the stored sequence is even-length, at most `max_turns`
//! long, and always starts with a user turn.

use serde::{Deserialize, Serialize};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, size-bounded list of turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationStore {
    /// Create an empty store. `max_turns` should be even; see
    /// [`crate::config::BotSettings::context_limit`].
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// Rebuild a store from previously saved turns, re-establishing the
    /// length and pairing invariants. Turns that are not part of a
    /// user-then-assistant pair are dropped.
    pub fn from_turns(turns: Vec<Turn>, max_turns: usize) -> Self {
        let mut paired = Vec::with_capacity(turns.len());
        let mut turns = turns.into_iter().peekable();
        while let Some(turn) = turns.next() {
            if turn.role == Role::User
                && let Some(answer) = turns.next_if(|next| next.role == Role::Assistant)
            {
                paired.push(turn);
                paired.push(answer);
            }
        }

        let mut store = Self {
            turns: paired,
            max_turns,
        };
        store.trim(max_turns);
        if store.turns.len() % 2 == 1 {
            store.turns.remove(0);
        }
        store
    }

    pub fn append_pair(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::user(user));
        self.turns.push(Turn::assistant(assistant));
        self.trim(self.max_turns);
    }

    /// Keep only the newest `max_len` turns.
    pub fn trim(&mut self, max_len: usize) {
        if self.turns.len() > max_len {
            let excess = self.turns.len() - max_len;
            self.turns.drain(..excess);
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

    /// Number of complete user/assistant exchanges held.
    pub fn pair_count(&self) -> usize {
        self.turns.len() / 2
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
