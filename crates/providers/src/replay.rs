//! Replay provider: answers from a scripted list of turns.
//!
//! Each call to `complete()` or `stream()` consumes the next turn. When
//! streaming, a turn is emitted as a thinking chunk, word-sized content
//! chunks, one chunk carrying the tool calls, and a final `done` chunk with
//! usage.
//!
//! Script format (JSON array):
//! ```json
//! [
//!   { "tool_calls": [{ "name": "calculator", "arguments": { "expression": "2+2" } }] },
//!   { "content": "2 + 2 = 4", "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 } }
//! ]
//! ```

use std::path::Path;
use std::sync::Mutex;
use async_trait::async_trait;
use agentflow_core::error::ProviderError;
use agentflow_core::message::{Message, MessageToolCall};
use agentflow_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use serde::Deserialize;
use tracing::debug;

/// One scripted model reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptedTurn {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ScriptedToolCall>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ScriptedTurn {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// A reply requesting one tool call.
    pub fn tool(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_calls: vec![ScriptedToolCall {
                id: None,
                name: name.into(),
                arguments,
            }],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Either a JSON object or a string holding raw argument text.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

pub struct ReplayProvider {
    model: String,
    turns: Vec<ScriptedTurn>,
    cursor: Mutex<usize>,
    streaming: bool,
}

impl ReplayProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            model: "replay".into(),
            turns,
            cursor: Mutex::new(0),
            streaming: true,
        }
    }

    /// Parse a JSON script.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let turns: Vec<ScriptedTurn> = serde_json::from_str(json)
            .map_err(|e| ProviderError::NotConfigured(format!("Invalid replay script: {e}")))?;
        Ok(Self::new(turns))
    }

    /// Load a JSON script from disk.
    pub fn from_file(path: &Path) -> Result<Self, ProviderError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::NotConfigured(format!("Cannot read replay script {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Turn streaming support on or off.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// How many turns have been consumed.
    pub fn consumed(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn next_turn(&self) -> Result<(usize, ScriptedTurn), ProviderError> {
        let mut cursor = self.cursor.lock().unwrap_or_else(|p| p.into_inner());
        let index = *cursor;
        let turn = self
            .turns
            .get(index)
            .cloned()
            .ok_or(ProviderError::Exhausted(self.turns.len()))?;
        *cursor += 1;
        debug!(turn = index, remaining = self.turns.len() - index - 1, "Replaying turn");
        Ok((index, turn))
    }
}

fn tool_calls_of(index: usize, turn: &ScriptedTurn) -> Vec<MessageToolCall> {
    turn.tool_calls
        .iter()
        .enumerate()
        .map(|(i, call)| MessageToolCall {
            id: call.id.clone().unwrap_or_else(|| format!("call_{index}_{i}")),
            name: call.name.clone(),
            arguments: match &call.arguments {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "{}".to_string(),
                other => other.to_string(),
            },
        })
        .collect()
}

#[async_trait]
impl Provider for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let (index, turn) = self.next_turn()?;
        // A tool-less request cannot take tool calls; drop them like a real model would.
        let tool_calls = if request.has_tools() {
            tool_calls_of(index, &turn)
        } else {
            Vec::new()
        };
        Ok(ProviderResponse {
            message: Message::assistant_with_tool_calls(turn.content, tool_calls),
            usage: turn.usage,
            model: self.model.clone(),
        })
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        if !self.streaming {
            return Err(ProviderError::StreamingUnsupported(self.name().to_string()));
        }
        let (index, turn) = self.next_turn()?;
        let tool_calls = if request.has_tools() {
            tool_calls_of(index, &turn)
        } else {
            Vec::new()
        };

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        tokio::spawn(async move {
            let mut chunks = Vec::new();
            if let Some(thinking) = turn.thinking {
                chunks.push(StreamChunk {
                    thinking: Some(thinking),
                    ..Default::default()
                });
            }
            for word in turn.content.split_inclusive(' ') {
                chunks.push(StreamChunk {
                    content: Some(word.to_string()),
                    ..Default::default()
                });
            }
            if !tool_calls.is_empty() {
                chunks.push(StreamChunk {
                    tool_calls,
                    ..Default::default()
                });
            }
            chunks.push(StreamChunk {
                done: true,
                usage: turn.usage,
                ..Default::default()
            });

            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
