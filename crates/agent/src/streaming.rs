//! Streaming runs.
//!
//! `run_stream` spawns a worker that drives the agent and pushes
//! [`StreamEvent`]s into a bounded channel. The forwarder travels in the
//! run context, so sub-agents that can stream write their own events into
//! the same channel, tagged with their own name.

use agentflow_core::context::RunContext;
use agentflow_core::error::ProviderError;
use agentflow_core::message::{Message, MessageToolCall};
use agentflow_core::provider::{ProviderRequest, ProviderResponse};
use agentflow_core::stream::{StreamEvent, StreamForwarder};
use agentflow_telemetry::TokenCounts;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::agent::{Agent, AgentInner};
use crate::error::AgentError;

/// Send an event, treating a closed or cancelled stream as cancellation.
pub(crate) async fn emit(forwarder: &StreamForwarder, event: StreamEvent) -> Result<(), AgentError> {
    if forwarder.send(event).await {
        Ok(())
    } else {
        Err(AgentError::Cancelled)
    }
}

/// One streamed provider turn.
///
/// Content and thinking deltas are forwarded as they arrive. Tool-call
/// fragments are merged and returned in the assembled message, which has
/// the same shape a blocking call would produce.
///
/// Text that reached the stream accumulates in `content`. When the turn
/// fails partway, it is still there for the caller to commit to memory.
pub(crate) async fn stream_turn(
    agent: &AgentInner,
    ctx: &RunContext,
    forwarder: &StreamForwarder,
    mut request: ProviderRequest,
    content: &mut String,
) -> Result<ProviderResponse, AgentError> {
    let provider = agent.provider()?;
    request.stream = true;
    debug!(agent = %agent.name, provider = provider.name(), tools = request.tools.len(), "Streaming provider turn");

    let cancel = ctx.cancellation();
    let mut rx = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
        rx = provider.stream(request) => rx?,
    };

    let mut tool_calls: Vec<MessageToolCall> = Vec::new();
    let mut usage = None;
    let mut finished = false;

    while !finished {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            chunk = rx.recv() => chunk,
        };
        let Some(chunk) = chunk else {
            return Err(ProviderError::StreamInterrupted(format!(
                "{} closed the stream before it finished",
                provider.name()
            ))
            .into());
        };
        let chunk = chunk?;

        if let Some(thinking) = chunk.thinking.filter(|t| !t.is_empty()) {
            emit(forwarder, StreamEvent::thinking(&agent.name, thinking)).await?;
        }
        if let Some(delta) = chunk.content.filter(|c| !c.is_empty()) {
            emit(forwarder, StreamEvent::content(&agent.name, delta.clone())).await?;
            content.push_str(&delta);
        }
        for fragment in chunk.tool_calls {
            merge_tool_call(&mut tool_calls, fragment);
        }
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
        finished = chunk.done;
    }

    let tokens = usage.as_ref().map(TokenCounts::from).unwrap_or_default();
    ctx.usage().record_llm_call(&agent.model, tokens);

    Ok(ProviderResponse {
        message: Message::assistant_with_tool_calls(std::mem::take(content), tool_calls),
        usage,
        model: agent.model.clone(),
    })
}

/// Fold a tool-call fragment into the calls seen so far. A fragment with a
/// known id, or with no id at all, continues an earlier call's arguments.
fn merge_tool_call(calls: &mut Vec<MessageToolCall>, fragment: MessageToolCall) {
    let existing = if fragment.id.is_empty() {
        calls.last_mut()
    } else {
        calls.iter_mut().find(|c| c.id == fragment.id)
    };
    match existing {
        Some(call) => {
            if call.name.is_empty() {
                call.name = fragment.name;
            }
            call.arguments.push_str(&fragment.arguments);
        }
        None => calls.push(fragment),
    }
}

impl Agent {
    /// Start a streaming run. Events arrive on the returned receiver; the
    /// stream ends after a `complete` or `error` event, or silently when
    /// the run is cancelled.
    pub async fn run_stream(&self, input: &str) -> Result<mpsc::Receiver<StreamEvent>, AgentError> {
        self.run_stream_with_cancel(input, CancellationToken::new()).await
    }

    /// Like [`run_stream`](Self::run_stream), stopped early when `cancel`
    /// fires.
    pub async fn run_stream_with_cancel(
        &self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, AgentError> {
        let ctx = self.new_context().with_cancellation(cancel);
        self.run_stream_with_context(ctx, input).await
    }

    pub async fn run_stream_with_context(
        &self,
        ctx: RunContext,
        input: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>, AgentError> {
        if !self.supports_streaming() {
            return Err(self.streaming_unsupported());
        }

        let (tx, rx) = mpsc::channel(self.inner.stream_buffer);
        let forwarder = StreamForwarder::new(tx, ctx.cancellation().clone());
        let ctx = ctx.with_forwarder(forwarder.clone());
        let agent = self.clone();
        let input = input.to_string();

        info!(agent = %self.name(), run_id = ctx.usage().run_id(), "Starting streaming run");
        tokio::spawn(async move {
            let result = agent.stream_with_context(&ctx, &forwarder, &input).await;
            ctx.usage().finish();
            match result {
                Ok(_) => debug!(agent = %agent.name(), "Streaming run finished"),
                Err(AgentError::Cancelled) => info!(agent = %agent.name(), "Streaming run cancelled"),
                Err(e) => warn!(agent = %agent.name(), error = %e, "Streaming run failed"),
            }
        });

        Ok(rx)
    }
}
