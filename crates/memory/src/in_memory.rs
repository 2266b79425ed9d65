//! In-memory conversation: the default for CLI sessions and tests.

use agentflow_core::error::MemoryError;
use agentflow_core::memory::ConversationMemory;
use agentflow_core::message::{Conversation, Message};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Keeps the conversation in a `Vec`, optionally windowed to the most
/// recent `max_messages`.
///
/// When the window slides, leading tool results are dropped with it so the
/// history never opens with a result whose tool call is gone.
#[derive(Clone)]
pub struct InMemoryConversation {
    conversation: Arc<RwLock<Conversation>>,
    max_messages: usize,
}

impl InMemoryConversation {
    pub fn new() -> Self {
        Self {
            conversation: Arc::new(RwLock::new(Conversation::new())),
            max_messages: 0,
        }
    }

    /// Keep only the last `max` messages. `0` means unbounded.
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }
}

impl Default for InMemoryConversation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationMemory for InMemoryConversation {
    fn name(&self) -> &str { "in_memory" }

    async fn add_message(&self, message: Message) -> Result<(), MemoryError> {
        let mut conv = self.conversation.write().await;
        conv.push(message);

        if self.max_messages > 0 {
            let dropped = conv.retain_last(self.max_messages);
            if dropped > 0 {
                debug!(dropped, retained = conv.messages.len(), "Memory window slid");
            }
        }
        Ok(())
    }

    async fn messages(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(self.conversation.read().await.messages.clone())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.conversation.write().await.messages.clear();
        Ok(())
    }
}
