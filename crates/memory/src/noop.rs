//! No-op memory: the agent remembers nothing between requests.

use agentflow_core::error::MemoryError;
use agentflow_core::memory::ConversationMemory;
use agentflow_core::message::Message;
use async_trait::async_trait;

/// A memory that stores nothing.
pub struct NoopMemory;

#[async_trait]
impl ConversationMemory for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn add_message(&self, _message: Message) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn messages(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(Vec::new())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}
