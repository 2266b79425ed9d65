//! The bounded tool-calling loop.
//!
//! Each iteration sends the transcript with the tool definitions attached.
//! A reply without tool calls ends the loop. Otherwise every requested tool
//! runs in order and its result is appended to the transcript. After
//! `max_iterations` tool-enabled calls, one last call is made with no tools
//! so the model has to answer in text.

use agentflow_core::context::RunContext;
use agentflow_core::message::{Message, MessageToolCall};
use agentflow_core::provider::{ProviderRequest, ProviderResponse};
use agentflow_core::stream::{StreamEvent, StreamForwarder};
use agentflow_core::tool::ToolCall;
use tracing::{debug, info, warn};
use crate::agent::AgentInner;
use crate::error::AgentError;
use crate::streaming::{emit, stream_turn};

const FINAL_ANSWER_INSTRUCTION: &str = "You have reached the limit of tool calls for this request. \
Answer the user now using the information you already have. Do not request any more tools.";

pub(crate) struct ToolLoop<'a> {
    agent: &'a AgentInner,
    ctx: &'a RunContext,
    forwarder: Option<&'a StreamForwarder>,
}

impl<'a> ToolLoop<'a> {
    pub(crate) fn new(agent: &'a AgentInner, ctx: &'a RunContext, forwarder: Option<&'a StreamForwarder>) -> Self {
        Self { agent, ctx, forwarder }
    }

    /// Run the loop over `transcript`, which ends with the user's message.
    ///
    /// Assistant and tool messages are pushed onto `produced` as they are
    /// created, so the caller can persist them even when the loop fails.
    pub(crate) async fn run(
        &self,
        mut transcript: Vec<Message>,
        produced: &mut Vec<Message>,
    ) -> Result<String, AgentError> {
        let definitions = self.agent.tools.definitions();

        for iteration in 1..=self.agent.max_iterations {
            debug!(agent = %self.agent.name, iteration, "Tool loop iteration");
            let request = self.agent.request(&transcript, definitions.clone());
            let message = self.call(request, produced).await?.message;

            if message.tool_calls.is_empty() {
                let content = message.content.clone();
                produced.push(message);
                return Ok(content);
            }

            let calls = message.tool_calls.clone();
            produced.push(message.clone());
            transcript.push(message);

            for call in &calls {
                let output = self.invoke(call).await?;
                let result = Message::tool_result(&call.id, output);
                produced.push(result.clone());
                transcript.push(result);
            }
        }

        info!(
            agent = %self.agent.name,
            max_iterations = self.agent.max_iterations,
            "Tool iteration limit reached, requesting final answer"
        );
        transcript.push(Message::system(FINAL_ANSWER_INSTRUCTION));
        let request = self.agent.request(&transcript, Vec::new());
        let response = self.call(request, produced).await?;
        if !response.message.tool_calls.is_empty() {
            warn!(agent = %self.agent.name, "Ignoring tool calls in final answer");
        }
        let content = response.message.content;
        produced.push(Message::assistant(&content));
        Ok(content)
    }

    /// One provider call. Text streamed before a failure is kept as an
    /// assistant message in `produced`.
    async fn call(
        &self,
        request: ProviderRequest,
        produced: &mut Vec<Message>,
    ) -> Result<ProviderResponse, AgentError> {
        if self.ctx.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let Some(fwd) = self.forwarder else {
            return self.agent.complete(self.ctx, request).await;
        };

        let mut streamed = String::new();
        let result = stream_turn(self.agent, self.ctx, fwd, request, &mut streamed).await;
        if result.is_err() && !streamed.is_empty() {
            debug!(agent = %self.agent.name, chars = streamed.len(), "Keeping partial streamed reply");
            produced.push(Message::assistant(streamed));
        }
        result
    }

    /// Execute one tool call. Ordinary tool failures become the result text
    /// the model sees; delegation limits and cancellation abort the run.
    async fn invoke(&self, call: &MessageToolCall) -> Result<String, AgentError> {
        let agent = &self.agent.name;
        self.ctx.usage().add_tool_call(&call.name);
        if let Some(fwd) = self.forwarder {
            emit(fwd, StreamEvent::tool_call(agent, &call.id, &call.name, &call.arguments)).await?;
        }

        debug!(agent = %agent, tool = %call.name, id = %call.id, "Executing tool");
        let tool_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        };
        let outcome = tokio::select! {
            biased;
            _ = self.ctx.cancellation().cancelled() => return Err(AgentError::Cancelled),
            outcome = self.agent.tools.execute(self.ctx, &tool_call) => outcome,
        };

        let (output, ok) = match outcome {
            Ok(output) => (output, true),
            Err(e) if e.is_fatal() => {
                warn!(agent = %agent, tool = %call.name, error = %e, "Tool call aborted the run");
                return Err(e.into());
            }
            Err(e) => {
                warn!(agent = %agent, tool = %call.name, error = %e, "Tool call failed");
                (format!("Error executing tool: {e}"), false)
            }
        };

        if let Some(fwd) = self.forwarder {
            emit(fwd, StreamEvent::tool_result(agent, &call.id, &call.name, &call.arguments, &output, ok)).await?;
        }
        Ok(output)
    }
}
