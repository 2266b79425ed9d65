//! Built-in tool implementations for AgentFlow.
//!
//! Real capabilities are supplied by the embedding application; this crate
//! carries the calculator so an agent can be exercised end to end.

pub mod calculator;

use std::sync::Arc;
use agentflow_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;

/// Create a registry holding every built-in tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatorTool));
    registry
}
