//! In-memory message log for the active session

use crate::model::{LocalRef, Message, MessageStatus};

/// Ordered log of the messages on display
///
/// Holds at most one session's messages. `generation` changes whenever the
/// log is reset (`clear`/`replace`), so a reply that was in flight across a
/// reset can be recognised as stale.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    generation: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Swap in a full history, oldest first
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.generation += 1;
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns false when no message carries `local_ref`
    pub fn mark_status(&mut self, local_ref: LocalRef, status: MessageStatus) -> bool {
        match self.messages.iter_mut().find(|m| m.local_ref == local_ref) {
            Some(message) => {
                message.status = status;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
    }
}
