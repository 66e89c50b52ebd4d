
use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message. Past turns are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Opaque handle to a synthesized audio clip, when one exists.
    pub audio_ref: Option<String>,
}

impl ConversationTurn {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            audio_ref: None,
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            audio_ref: None,
        }
    }

    #[inline]
    pub fn with_audio_ref(mut self, audio_ref: impl Into<String>) -> Self {
        self.audio_ref = Some(audio_ref.into());
        self
    }
}

/// Append-only, in-memory chat history for one UI session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    turns: Vec<ConversationTurn>,
}

impl SessionState {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// The most recent `n` turns in chronological order.
    #[inline]
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    #[inline]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Reset to empty. Driven by an explicit user action, never automatic.
    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
