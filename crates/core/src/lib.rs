//! # AgentFlow Core
//!
//! Domain types, traits, and error definitions for the AgentFlow execution
//! engine. Collaborators (providers, tools, memory, guardrails) are defined
//! here as traits; the execution core in `agentflow-agent` is written against
//! them and never against a concrete implementation.
//!
//! ## Design Philosophy
//!
//! - Every collaborator is a trait, so tests can script it
//! - Per-run state travels in an explicit [`RunContext`] value, never in globals
//! - All crates depend inward on core

pub mod context;
pub mod error;
pub mod guardrail;
pub mod memory;
pub mod message;
pub mod provider;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::{Delegation, MAX_DELEGATION_DEPTH, RunContext};
pub use error::{GuardrailError, MemoryError, ProviderError, ToolError};
pub use guardrail::{BlocklistGuardrail, GuardStage, Guardrail};
pub use memory::ConversationMemory;
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage};
pub use stream::{StreamEvent, StreamEventKind, StreamForwarder, ToolCallStatus, ToolEvent};
pub use tool::{ParameterSpec, Tool, ToolCall, ToolRegistry};
