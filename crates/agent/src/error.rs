//! Errors raised by the execution engine.

use agentflow_core::error::{GuardrailError, MemoryError, ProviderError, ToolError};
use thiserror::Error;
use crate::plan::PlanStatus;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent cannot be built or used as configured.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(ToolError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Guardrail error: {0}")]
    Guardrail(#[from] GuardrailError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Delegation error: {0}")]
    Delegation(#[from] DelegationError),

    #[error("Provider '{0}' does not support streaming")]
    StreamingUnsupported(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Remote agent error: {0}")]
    Remote(String),
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::DelegationLimit { depth, max, chain } => {
                Self::Delegation(DelegationError::RecursionLimit { depth, max, chain })
            }
            ToolError::Cancelled(_) => Self::Cancelled,
            other => Self::Tool(other),
        }
    }
}

impl AgentError {
    /// Convert into the error a tool reports when it wraps an agent.
    ///
    /// Delegation limits and cancellation stay fatal so they abort the
    /// caller's run instead of being fed back to its model.
    pub fn into_tool_error(self, tool_name: &str) -> ToolError {
        match self {
            Self::Delegation(DelegationError::RecursionLimit { depth, max, chain }) => {
                ToolError::DelegationLimit { depth, max, chain }
            }
            Self::Cancelled => ToolError::Cancelled(tool_name.to_string()),
            Self::Tool(err) if err.is_fatal() => err,
            other => ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan not found: {0}")]
    NotFound(String),

    #[error("Plan {0} has not been approved by the user")]
    NotApproved(String),

    #[error("Plan {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: PlanStatus,
        to: PlanStatus,
    },

    #[error("No tools available to build a plan")]
    NoTools,

    #[error("No JSON object found in plan response")]
    JsonNotFound,

    #[error("Plan response is not valid plan JSON: {0}")]
    JsonDecode(String),

    #[error("Step {step}: unknown tool '{tool}'")]
    UnknownTool { step: usize, tool: String },

    #[error("Step {step}: cannot encode arguments for '{tool}': {reason}")]
    Arguments { step: usize, tool: String, reason: String },

    #[error("Step {step}: tool '{tool}' failed: {reason}")]
    StepFailed { step: usize, tool: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("Sub-agent cycle detected: {path}")]
    Cycle { path: String },

    #[error("Sub-agent tree under '{agent}' is {depth} levels deep (max {max})")]
    TooDeep {
        agent: String,
        depth: usize,
        max: usize,
    },

    #[error("Delegation depth {depth} exceeds limit {max} ({chain})")]
    RecursionLimit {
        depth: usize,
        max: usize,
        chain: String,
    },
}
