//! Error types for the AgentFlow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum; the engine wraps them in
//! `AgentError`.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The chunk stream closed before a `done` chunk arrived.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider '{0}' does not support streaming")]
    StreamingUnsupported(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider script exhausted after {0} responses")]
    Exhausted(usize),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// The backing store rejected a read or write.
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The runtime delegation guard refused a nested sub-agent call.
    #[error("Delegation depth {depth} exceeds limit {max} ({chain})")]
    DelegationLimit {
        depth: usize,
        max: usize,
        chain: String,
    },

    #[error("Tool call cancelled: {0}")]
    Cancelled(String),
}

impl ToolError {
    /// Errors that must abort the run instead of being fed back to the model.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DelegationLimit { .. } | Self::Cancelled(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum GuardrailError {
    #[error("Blocked by guardrail '{guardrail}': {reason}")]
    Violation { guardrail: String, reason: String },
}
