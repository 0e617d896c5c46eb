//! Multi-turn conversation history.
//!
//! The system message sits at index 0 for the conversation's lifetime.  User and assistant
//! messages are appended in pairs, and only once an exchange has produced its final text, so the
//! history never holds a question without its answer.

use crate::types::{Message, Role};

/// Ordered, append-only role/content history.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation with the given system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Record a completed exchange: the user message, then the assistant reply.
    pub fn append_exchange(
        &mut self,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) {
        self.messages.push(Message::user(user_text));
        self.messages.push(Message::assistant(assistant_text));
    }

    /// The full history, system message first.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// The messages to send for a new user turn: the history followed by `user_text`.
    ///
    /// A `prefill` becomes a trailing assistant message that the model continues from.  The
    /// conversation itself is not modified, so neither the user turn nor the prefill is recorded.
    pub fn request_messages(&self, user_text: &str, prefill: Option<&str>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        messages.extend_from_slice(&self.messages);
        messages.push(Message::user(user_text));
        if let Some(prefill) = prefill {
            messages.push(Message::assistant(prefill));
        }
        messages
    }

    /// The system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// Number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; the system message is always present.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of completed exchanges.
    pub fn exchanges(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .count()
    }

    /// Drop every exchange, keeping the system message.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }
}
