//! Memory trait: the agent's conversation history.
//!
//! Memory holds user, assistant and tool messages in insertion order. The
//! system prompt is never stored; the engine prepends it to each request.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::Message;

/// Ordered store of conversation messages.
///
/// Implementations must be safe to share between tasks; the engine appends
/// from spawned streaming workers as well as from the caller's task.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Append a message.
    async fn add_message(&self, message: Message) -> Result<(), MemoryError>;

    /// All retained messages, oldest first.
    async fn messages(&self) -> Result<Vec<Message>, MemoryError>;

    /// Forget everything.
    async fn clear(&self) -> Result<(), MemoryError>;

    /// Append several messages in order.
    async fn add_messages(&self, messages: Vec<Message>) -> Result<(), MemoryError> {
        for message in messages {
            self.add_message(message).await?;
        }
        Ok(())
    }

    /// Number of retained messages.
    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.messages().await?.len())
    }
}
