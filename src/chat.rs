//! Chat context handed to the language model.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// Ordered conversation history, starting with the system prompt when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    messages: Vec<ChatMessage>,
}

impl ChatContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self::new().append(ChatRole::System, prompt)
    }

    /// Append a message, returning the updated context.
    #[must_use]
    pub fn append(mut self, role: ChatRole, text: impl Into<String>) -> Self {
        self.push(role, text);
        self
    }

    /// Append a message in place.
    pub fn push(&mut self, role: ChatRole, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            text: text.into(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The system prompt, if the context starts with one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.text.as_str())
    }

    /// Keep at most `max` non-system messages, dropping the oldest.
    ///
    /// System messages are always kept. `max == 0` disables trimming.
    pub fn trim_history(&mut self, max: usize) {
        if max == 0 {
            return;
        }
        let history = self
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .count();
        let mut excess = history.saturating_sub(max);
        if excess == 0 {
            return;
        }
        self.messages.retain(|m| {
            if excess > 0 && m.role != ChatRole::System {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}
