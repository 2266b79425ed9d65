//! The AgentFlow execution engine.
//!
//! An [`Agent`] answers a request in one of a few ways:
//!
//! 1. **Plan actions**: `approve <id>`, `modify <id> <feedback>`,
//!    `cancel <id>` and `status <id>` act on a stored plan
//! 2. **Role questions** ("who are you?") get one tool-less model call
//! 3. **Plan mode**: with tools and approval required, the model drafts an
//!    [`ExecutionPlan`] that runs only after the user approves it
//! 4. **Tool loop**: otherwise the model calls tools for up to
//!    `max_iterations` rounds, then must answer in text
//!
//! Sub-agents are exposed to their parent as `<name>_agent` tools. Runs can
//! be streamed; nested agents write into the same event stream.

pub mod agent;
pub mod commands;
pub mod error;
pub mod executor;
pub mod plan;
pub mod planner;
pub mod remote;
pub mod streaming;
pub mod subagent;
mod tool_loop;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{
    Agent, AgentBuilder, DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL, DEFAULT_STREAM_BUFFER, RunOutcome,
};
pub use commands::{PlanCommand, is_role_question};
pub use error::{AgentError, DelegationError, PlanError};
pub use plan::{ExecutionPlan, PlanStatus, PlanStep, PlanStore};
pub use remote::RemoteAgent;
pub use subagent::{MAX_SUBAGENT_DEPTH, SubAgentTool, render_tree, validate_graph};
