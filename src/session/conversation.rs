//! Conversation log for a single session
//!
//! The log is append-only: there is no API to edit, remove or reorder a
//! turn once it has been recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Append-only ordered sequence of turns
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Record a turn at the end of the log
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Every recorded turn, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// History to send with a generation request.
    ///
    /// Only answered exchanges are included: a user turn is kept when the
    /// next turn is its assistant reply. The in-flight query and queries
    /// whose exchange failed are left out, so the history alternates roles
    /// and the composer appends the live query as the final turn.
    pub fn history_excluding_current(&self) -> Vec<Turn> {
        let mut history = Vec::with_capacity(self.turns.len());
        let mut turns = self.turns.iter().peekable();

        while let Some(turn) = turns.next() {
            match turn.role() {
                Role::User => {
                    if let Some(reply) = turns.next_if(|t| t.role() == Role::Assistant) {
                        history.push(turn.clone());
                        history.push(reply.clone());
                    }
                }
                Role::Assistant => history.push(turn.clone()),
            }
        }

        history
    }

    /// Most recent `limit` turns, newest first
    pub fn recent(&self, limit: usize) -> Vec<&Turn> {
        self.turns.iter().rev().take(limit).collect()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
