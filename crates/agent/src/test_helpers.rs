//! Shared test helpers for agent tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use agentflow_core::context::RunContext;
use agentflow_core::error::{ProviderError, ToolError};
use agentflow_core::message::{Message, MessageToolCall};
use agentflow_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use agentflow_core::tool::{ParameterSpec, Tool};
use async_trait::async_trait;

/// A mock provider that returns a sequence of scripted responses and
/// records every request it receives.
///
/// Runs out with `ProviderError::Exhausted` instead of panicking, so tests
/// can assert on what happens when a provider fails mid-run.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
    streaming: bool,
    thinking: Option<String>,
    delay: Option<Duration>,
    fail_mid_stream: bool,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            streaming: false,
            thinking: None,
            delay: None,
            fail_mid_stream: false,
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![make_tool_call_response(tool_calls, thought), make_text_response(answer)])
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Emit this reasoning text before every streamed answer.
    pub fn with_thinking(mut self, thinking: &str) -> Self {
        self.thinking = Some(thinking.to_string());
        self
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Break each stream after its content, before the final chunk.
    pub fn failing_mid_stream(mut self) -> Self {
        self.fail_mid_stream = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    async fn next(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ProviderError::Exhausted(call - 1))
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.next(request).await
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        if !self.streaming {
            return Err(ProviderError::StreamingUnsupported(self.name().to_string()));
        }
        let response = self.next(request).await?;
        let thinking = self.thinking.clone();
        let fail = self.fail_mid_stream;
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tokio::spawn(async move {
            if let Some(thinking) = thinking {
                let chunk = StreamChunk { thinking: Some(thinking), ..Default::default() };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            for word in response.message.content.split_inclusive(' ') {
                let chunk = StreamChunk { content: Some(word.to_string()), ..Default::default() };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            if fail {
                let _ = tx.send(Err(ProviderError::StreamInterrupted("connection reset".into()))).await;
                return;
            }
            let last = StreamChunk {
                tool_calls: response.message.tool_calls,
                done: true,
                usage: response.usage,
                ..Default::default()
            };
            let _ = tx.send(Ok(last)).await;
        });
        Ok(rx)
    }
}

fn mock_usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
        reasoning_tokens: 0,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(thought, tool_calls),
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call with id `call_<name>`.
pub fn make_tool_call(name: &str, arguments: &str) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

/// A tool that always returns the same output and counts its calls.
pub struct StaticTool {
    name: String,
    output: String,
    calls: AtomicUsize,
    last_arguments: Mutex<Option<String>>,
}

impl StaticTool {
    pub fn new(name: &str, output: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            output: output.to_string(),
            calls: AtomicUsize::new(0),
            last_arguments: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_arguments(&self) -> Option<String> {
        self.last_arguments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "static test tool"
    }

    fn parameters(&self) -> BTreeMap<String, ParameterSpec> {
        BTreeMap::from([("q".to_string(), ParameterSpec::optional("string", "anything"))])
    }

    async fn execute(&self, _ctx: &RunContext, arguments: &str) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_arguments.lock().unwrap() = Some(arguments.to_string());
        Ok(self.output.clone())
    }
}
