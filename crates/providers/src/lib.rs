//! Provider implementations for AgentFlow.
//!
//! All providers implement the `agentflow_core::Provider` trait. Network
//! clients are supplied by the embedding application; this crate carries the
//! offline replay provider used by the CLI and integration tests.

pub mod replay;

pub use replay::{ReplayProvider, ScriptedToolCall, ScriptedTurn};
