//! Remote agents: agents that run in another process.
//!
//! An [`Agent`](crate::Agent) built around a [`RemoteAgent`] forwards every
//! request to it instead of running the local engine. The transport is the
//! implementor's concern; the handle is released by `close()`.

use agentflow_core::context::RunContext;
use agentflow_core::stream::StreamForwarder;
use async_trait::async_trait;
use crate::error::AgentError;

#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Where the agent lives, for logs.
    fn endpoint(&self) -> &str;

    /// Run a request to completion.
    async fn run(&self, ctx: &RunContext, input: &str) -> Result<String, AgentError>;

    /// Whether `run_stream` produces incremental events.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Run a request, pushing the remote's events into `forwarder`.
    /// Returns the final response. Terminal events are the caller's job.
    async fn run_stream(
        &self,
        ctx: &RunContext,
        input: &str,
        _forwarder: &StreamForwarder,
    ) -> Result<String, AgentError> {
        self.run(ctx, input).await
    }

    /// Release the connection.
    async fn close(&self) -> Result<(), AgentError>;
}
